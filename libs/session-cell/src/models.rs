use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::user::UserProfile;

/// The `data` object of a login response: the token plus the account fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub access_token: String,
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub profile: UserProfile,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("session data could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),
}
