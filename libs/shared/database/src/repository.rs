use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_models::report::MedicalReport;
use shared_models::user::{EmailVerification, UserRecord};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound("record not found".to_string()),
            RepositoryError::DuplicateEmail => {
                AppError::Conflict("email already registered".to_string())
            }
            RepositoryError::Backend(msg) => AppError::Database(msg),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `DuplicateEmail` when the e-mail is already taken.
    async fn insert_user(&self, user: UserRecord) -> RepositoryResult<UserRecord>;

    async fn find_user(&self, id: Uuid) -> RepositoryResult<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<UserRecord>>;

    /// Replaces the stored record with the same id.
    async fn update_user(&self, user: UserRecord) -> RepositoryResult<UserRecord>;

    async fn list_users_by_role(&self, role: Role) -> RepositoryResult<Vec<UserRecord>>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn insert_appointment(&self, appointment: Appointment) -> RepositoryResult<Appointment>;

    async fn find_appointment(&self, id: Uuid) -> RepositoryResult<Option<Appointment>>;

    /// Appointments that reference `user_id` in the column matching `role`,
    /// earliest first.
    async fn list_appointments_for(
        &self,
        role: Role,
        user_id: Uuid,
    ) -> RepositoryResult<Vec<Appointment>>;

    /// Compare-and-set on the status column. Returns `None` when the record is
    /// missing or its status is no longer `expected`.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> RepositoryResult<Option<Appointment>>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn insert_report(&self, report: MedicalReport) -> RepositoryResult<MedicalReport>;

    async fn list_reports_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> RepositoryResult<Vec<MedicalReport>>;
}

#[async_trait]
pub trait VerificationRepository: Send + Sync {
    /// Stores the code, replacing any earlier one for the same user.
    async fn save_verification(&self, verification: EmailVerification) -> RepositoryResult<()>;

    async fn find_verification(&self, user_id: Uuid) -> RepositoryResult<Option<EmailVerification>>;

    async fn delete_verification(&self, user_id: Uuid) -> RepositoryResult<()>;

    /// Compare-and-set increment of the attempt counter from `seen` to
    /// `seen + 1`. Returns the updated code, or `None` when it is gone or
    /// another submission claimed that attempt first.
    async fn claim_attempt(
        &self,
        user_id: Uuid,
        seen: u32,
    ) -> RepositoryResult<Option<EmailVerification>>;
}
