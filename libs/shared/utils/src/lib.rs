pub mod extractor;
pub mod jwt;
pub mod state;
pub mod test_utils;
pub mod validation;

pub use extractor::{auth_middleware, role_guard, JsonBody, RoleGuard};
pub use jwt::{TokenCodec, TokenError};
pub use state::AppState;
