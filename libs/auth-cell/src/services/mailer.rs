use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Delivery channel for verification codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(
        &self,
        email: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailError>;
}

/// Writes the code to the log instead of sending mail.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(
        &self,
        email: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailError> {
        info!("Verification code for {} is {} (expires {})", email, otp, expires_at);
        Ok(())
    }
}
