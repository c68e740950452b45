use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Verified payload of a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaim {
    #[serde(alias = "_id")]
    pub sub: Uuid,
    pub email: String,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

// Roles this service does not know about decode to `None` so the role guards
// reject them instead of the codec failing outright.
fn lenient_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}

/// Identity attached to a request once the access-control gate accepts it.
///
/// Handlers receive it through `Extension<RequestIdentity>`; it is never
/// persisted and never outlives the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_id: Uuid,
    pub user_email: String,
    pub user_role: Option<Role>,
}

impl RequestIdentity {
    pub fn has_role(&self, role: Role) -> bool {
        self.user_role == Some(role)
    }
}

impl From<SessionClaim> for RequestIdentity {
    fn from(claim: SessionClaim) -> Self {
        Self {
            user_id: claim.sub,
            user_email: claim.email,
            user_role: claim.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claim_accepts_legacy_id_key() {
        let id = Uuid::new_v4();
        let claim: SessionClaim = serde_json::from_value(json!({
            "_id": id,
            "email": "p@example.com",
            "role": "patient"
        }))
        .unwrap();

        assert_eq!(claim.sub, id);
        assert_eq!(claim.role, Some(Role::Patient));
    }

    #[test]
    fn unknown_or_missing_role_decodes_to_none() {
        let id = Uuid::new_v4();
        let admin: SessionClaim = serde_json::from_value(json!({
            "sub": id, "email": "a@example.com", "role": "admin"
        }))
        .unwrap();
        let missing: SessionClaim = serde_json::from_value(json!({
            "sub": id, "email": "a@example.com"
        }))
        .unwrap();

        assert_eq!(admin.role, None);
        assert_eq!(missing.role, None);
    }

    #[test]
    fn identity_copies_claim_fields() {
        let claim = SessionClaim {
            sub: Uuid::new_v4(),
            email: "d@example.com".to_string(),
            role: Some(Role::Doctor),
            iat: None,
            exp: None,
        };
        let identity = RequestIdentity::from(claim.clone());

        assert_eq!(identity.user_id, claim.sub);
        assert_eq!(identity.user_email, claim.email);
        assert!(identity.has_role(Role::Doctor));
        assert!(!identity.has_role(Role::Patient));
    }
}
