use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::RepositoryError;
use shared_models::error::AppError;
use shared_models::user::{UserProfile, UserView};
use shared_utils::TokenError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Kept as text so an unknown role is a validation error, not a JSON
    /// rejection.
    pub role: String,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(flatten)]
    pub user: UserView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOtpRequest {
    pub otp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationIssued {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("email already verified")]
    AlreadyVerified,

    #[error("invalid or expired otp")]
    InvalidOtp,

    #[error("verification code delivery failed: {0}")]
    Delivery(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateEmail => AuthError::EmailTaken,
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AppError::ValidationError(msg),
            AuthError::EmailTaken | AuthError::AlreadyVerified => {
                AppError::Conflict(err.to_string())
            }
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthError::InvalidOtp => AppError::ValidationError(err.to_string()),
            AuthError::PasswordHash(msg) => AppError::Internal(msg),
            AuthError::Delivery(msg) => AppError::ExternalService(msg),
            AuthError::Token(token_err) => AppError::Internal(token_err.to_string()),
            AuthError::Repository(repo_err) => repo_err.into(),
        }
    }
}
