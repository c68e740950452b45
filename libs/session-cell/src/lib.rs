//! Client-side cache of the signed-in user. Nothing on the server reads it;
//! it only saves a client from asking the API who it is on every start.

pub mod models;
pub mod storage;
pub mod store;

pub use models::{SessionError, SessionUser};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::SessionStore;
