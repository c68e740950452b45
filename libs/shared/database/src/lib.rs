pub mod memory;
pub mod repository;
pub mod supabase;

pub use memory::InMemoryStore;
pub use repository::{
    AppointmentRepository, ReportRepository, RepositoryError, RepositoryResult, UserRepository,
    VerificationRepository,
};
pub use supabase::{SupabaseClient, SupabaseStore};
