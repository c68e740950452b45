use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

/// Optional practice/personal details. Doctors fill in `specialization` and
/// `address`, patients `age` and `gender`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl UserProfile {
    /// Overlay the fields present in `update`.
    pub fn merge(&mut self, update: UserProfile) {
        if update.specialization.is_some() {
            self.specialization = update.specialization;
        }
        if update.address.is_some() {
            self.address = update.address;
        }
        if update.age.is_some() {
            self.age = update.age;
        }
        if update.gender.is_some() {
            self.gender = update.gender;
        }
    }
}

/// Stored account, including the password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            email_verified: self.email_verified,
            profile: self.profile.clone(),
            created_at: self.created_at,
        }
    }
}

/// What clients get to see of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
}

/// Outstanding one-time code. It proves ownership of `email` only, the
/// address it was sent to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerification {
    pub user_id: Uuid,
    pub email: String,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
    /// Submissions already checked against this code.
    #[serde(default)]
    pub attempts: u32,
}

impl EmailVerification {
    pub fn new(user_id: Uuid, email: &str, otp: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            email: email.to_string(),
            otp,
            expires_at,
            attempts: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Lower-cased, trimmed form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
