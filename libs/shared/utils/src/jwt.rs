use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, SessionClaim};

const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Every verification failure: missing, malformed, forged or expired.
    #[error("invalid token")]
    InvalidToken,

    #[error("token could not be signed: {0}")]
    Signing(String),
}

/// Strips an optional `Bearer ` prefix from an `Authorization` value.
pub fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    value.strip_prefix("Bearer ").map(str::trim).unwrap_or(value)
}

/// Signs and verifies HS256 session tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self { secret: secret.into(), ttl }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let ttl = Duration::try_hours(config.token_ttl_hours)
            .filter(|ttl| *ttl > Duration::zero())
            .unwrap_or_else(|| {
                warn!(
                    "Token lifetime of {} hours is unusable, using {} hours",
                    config.token_ttl_hours, DEFAULT_TTL_HOURS
                );
                Duration::hours(DEFAULT_TTL_HOURS)
            });
        Self::new(config.jwt_secret.clone(), ttl)
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is checked when present but not demanded.
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        validation.leeway = 0;
        validation
    }

    /// Verifies `token` (with or without a `Bearer ` prefix) and returns its claim.
    pub fn verify(&self, token: &str) -> Result<SessionClaim, TokenError> {
        if self.secret.is_empty() {
            debug!("JWT secret is not set");
            return Err(TokenError::InvalidToken);
        }

        let token = strip_bearer(token);
        let claim = decode::<SessionClaim>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Self::validation(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Token rejected: {:?}", e.kind());
            TokenError::InvalidToken
        })?;

        debug!("Token validated successfully for user: {}", claim.sub);
        Ok(claim)
    }

    /// Signs a fresh claim valid for the configured lifetime.
    pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> Result<String, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::Signing("JWT secret is not set".to_string()));
        }

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing("token lifetime overflows".to_string()))?;

        let claim = SessionClaim {
            sub: user_id,
            email: email.to_string(),
            role: Some(role),
            iat: Some(now.timestamp().max(0) as u64),
            exp: Some(expires_at.timestamp().max(0) as u64),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claim,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }
}
