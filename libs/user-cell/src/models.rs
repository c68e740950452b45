use serde::Deserialize;
use thiserror::Error;

use shared_database::RepositoryError;
use shared_models::error::AppError;
use shared_models::user::UserProfile;

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("user not found")]
    NotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ProfileError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ProfileError::NotFound,
            RepositoryError::DuplicateEmail => ProfileError::EmailTaken,
            other => ProfileError::Repository(other),
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => AppError::NotFound(err.to_string()),
            ProfileError::EmailTaken => AppError::Conflict(err.to_string()),
            ProfileError::Validation(msg) => AppError::ValidationError(msg),
            ProfileError::Repository(repo_err) => repo_err.into(),
        }
    }
}
