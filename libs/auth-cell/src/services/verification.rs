use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{UserRepository, VerificationRepository};
use shared_models::user::{EmailVerification, UserView};
use shared_utils::AppState;

use crate::models::{AuthError, VerificationIssued};
use crate::services::mailer::{LogMailer, Mailer};

pub const OTP_DIGITS: usize = 6;
/// Submissions allowed per code before it is discarded.
pub const MAX_OTP_ATTEMPTS: u32 = 5;

const DEFAULT_OTP_TTL_MINUTES: i64 = 10;

pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:0width$}", code, width = OTP_DIGITS)
}

pub struct EmailVerificationService {
    users: Arc<dyn UserRepository>,
    verifications: Arc<dyn VerificationRepository>,
    mailer: Arc<dyn Mailer>,
    ttl: Duration,
}

impl EmailVerificationService {
    pub fn new(state: &AppState) -> Self {
        Self::with_mailer(state, Arc::new(LogMailer))
    }

    pub fn with_mailer(state: &AppState, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            users: state.users.clone(),
            verifications: state.verifications.clone(),
            mailer,
            ttl: otp_ttl(state.config.otp_ttl_minutes),
        }
    }

    /// Issues a fresh code for `user_id`, replacing any outstanding one.
    #[instrument(skip(self))]
    pub async fn request(&self, user_id: Uuid) -> Result<VerificationIssued, AuthError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let verification =
            EmailVerification::new(user_id, &user.email, generate_otp(), Utc::now() + self.ttl);
        self.verifications.save_verification(verification.clone()).await?;

        self.mailer
            .send_verification_code(&user.email, &verification.otp, verification.expires_at)
            .await
            .map_err(|e| AuthError::Delivery(e.to_string()))?;
        info!("Verification code issued for {}", user_id);

        Ok(VerificationIssued {
            email: user.email,
            expires_at: verification.expires_at,
        })
    }

    #[instrument(skip(self, otp))]
    pub async fn submit(&self, user_id: Uuid, otp: &str) -> Result<UserView, AuthError> {
        let mut user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let Some(pending) = self.verifications.find_verification(user_id).await? else {
            debug!("No outstanding code for {}", user_id);
            return Err(AuthError::InvalidOtp);
        };

        if pending.is_expired(Utc::now()) {
            debug!("Code for {} expired at {}", user_id, pending.expires_at);
            self.verifications.delete_verification(user_id).await?;
            return Err(AuthError::InvalidOtp);
        }

        if pending.email != user.email {
            debug!("Code for {} was issued to a previous address", user_id);
            self.verifications.delete_verification(user_id).await?;
            return Err(AuthError::InvalidOtp);
        }

        if pending.attempts >= MAX_OTP_ATTEMPTS {
            self.verifications.delete_verification(user_id).await?;
            return Err(AuthError::InvalidOtp);
        }

        // Each comparison consumes one attempt, even under concurrent submits.
        let Some(claimed) = self.verifications.claim_attempt(user_id, pending.attempts).await? else {
            debug!("Attempt {} for {} was claimed concurrently", pending.attempts + 1, user_id);
            return Err(AuthError::InvalidOtp);
        };

        if claimed.otp != otp.trim() {
            if claimed.attempts >= MAX_OTP_ATTEMPTS {
                warn!("Too many wrong codes for {}, discarding", user_id);
                self.verifications.delete_verification(user_id).await?;
            }
            return Err(AuthError::InvalidOtp);
        }

        user.email_verified = true;
        user.updated_at = Utc::now();
        let user = self.users.update_user(user).await?;
        self.verifications.delete_verification(user_id).await?;

        info!("Email verified for {}", user_id);
        Ok(user.view())
    }
}

fn otp_ttl(minutes: i64) -> Duration {
    Duration::try_minutes(minutes)
        .filter(|ttl| *ttl > Duration::zero() && *ttl <= Duration::days(1))
        .unwrap_or_else(|| Duration::minutes(DEFAULT_OTP_TTL_MINUTES))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::DateTime;
    use shared_utils::test_utils::{TestConfig, TestUser};

    use super::*;
    use crate::services::mailer::MailError;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_verification_code(
            &self,
            email: &str,
            otp: &str,
            _expires_at: DateTime<Utc>,
        ) -> Result<(), MailError> {
            self.sent.lock().unwrap().push((email.to_string(), otp.to_string()));
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send_verification_code(
            &self,
            _email: &str,
            _otp: &str,
            _expires_at: DateTime<Utc>,
        ) -> Result<(), MailError> {
            Err(MailError("smtp unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn code_is_handed_to_mailer() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("p@example.com");
        user.register(&state).await;
        let mailer = Arc::new(RecordingMailer::default());

        EmailVerificationService::with_mailer(&state, mailer.clone())
            .request(user.id)
            .await
            .unwrap();

        let stored = state.verifications.find_verification(user.id).await.unwrap().unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[("p@example.com".to_string(), stored.otp)]);
    }

    #[tokio::test]
    async fn delivery_failure_surfaces() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("p@example.com");
        user.register(&state).await;

        let result = EmailVerificationService::with_mailer(&state, Arc::new(FailingMailer))
            .request(user.id)
            .await;

        assert_matches!(result, Err(AuthError::Delivery(_)));
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), OTP_DIGITS);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn submit_with_issued_code_verifies_email() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("p@example.com");
        user.register(&state).await;
        let service = EmailVerificationService::new(&state);

        service.request(user.id).await.unwrap();
        let otp = state.verifications.find_verification(user.id).await.unwrap().unwrap().otp;

        let view = service.submit(user.id, &otp).await.unwrap();
        assert!(view.email_verified);
        assert!(state.verifications.find_verification(user.id).await.unwrap().is_none());

        assert_matches!(service.request(user.id).await, Err(AuthError::AlreadyVerified));
    }

    #[tokio::test]
    async fn wrong_or_missing_code_is_rejected() {
        let state = TestConfig::default().to_state();
        let user = TestUser::doctor("d@example.com");
        user.register(&state).await;
        let service = EmailVerificationService::new(&state);

        assert_matches!(service.submit(user.id, "123456").await, Err(AuthError::InvalidOtp));

        service.request(user.id).await.unwrap();
        let otp = state.verifications.find_verification(user.id).await.unwrap().unwrap().otp;
        let wrong = if otp == "000000" { "111111" } else { "000000" };

        assert_matches!(service.submit(user.id, wrong).await, Err(AuthError::InvalidOtp));
    }

    #[tokio::test]
    async fn expired_code_is_rejected_and_discarded() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("p@example.com");
        user.register(&state).await;
        state
            .verifications
            .save_verification(EmailVerification::new(
                user.id,
                &user.email,
                "424242".to_string(),
                Utc::now() - Duration::minutes(1),
            ))
            .await
            .unwrap();

        let service = EmailVerificationService::new(&state);
        assert_matches!(service.submit(user.id, "424242").await, Err(AuthError::InvalidOtp));
        assert!(state.verifications.find_verification(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn code_is_discarded_after_too_many_wrong_guesses() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("p@example.com");
        user.register(&state).await;
        let service = EmailVerificationService::new(&state);

        service.request(user.id).await.unwrap();
        let otp = state.verifications.find_verification(user.id).await.unwrap().unwrap().otp;
        let wrong = if otp == "000000" { "111111" } else { "000000" };

        for _ in 0..MAX_OTP_ATTEMPTS {
            assert_matches!(service.submit(user.id, wrong).await, Err(AuthError::InvalidOtp));
        }

        assert_matches!(service.submit(user.id, &otp).await, Err(AuthError::InvalidOtp));
        assert!(state.verifications.find_verification(user.id).await.unwrap().is_none());
        assert!(!state.users.find_user(user.id).await.unwrap().unwrap().email_verified);
    }

    #[tokio::test]
    async fn correct_code_within_attempt_budget_still_verifies() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("p@example.com");
        user.register(&state).await;
        let service = EmailVerificationService::new(&state);

        service.request(user.id).await.unwrap();
        let otp = state.verifications.find_verification(user.id).await.unwrap().unwrap().otp;
        let wrong = if otp == "000000" { "111111" } else { "000000" };
        for _ in 0..MAX_OTP_ATTEMPTS - 1 {
            let _ = service.submit(user.id, wrong).await;
        }

        assert!(service.submit(user.id, &otp).await.unwrap().email_verified);
    }

    #[tokio::test]
    async fn code_sent_to_previous_address_is_refused() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("old@example.com");
        user.register(&state).await;
        let service = EmailVerificationService::new(&state);

        service.request(user.id).await.unwrap();
        let otp = state.verifications.find_verification(user.id).await.unwrap().unwrap().otp;

        let mut record = state.users.find_user(user.id).await.unwrap().unwrap();
        record.email = "new@example.com".to_string();
        state.users.update_user(record).await.unwrap();

        assert_matches!(service.submit(user.id, &otp).await, Err(AuthError::InvalidOtp));
        assert!(!state.users.find_user(user.id).await.unwrap().unwrap().email_verified);
    }

    #[test]
    fn unusable_otp_lifetime_falls_back_to_default() {
        assert_eq!(otp_ttl(15), Duration::minutes(15));
        for minutes in [0, -1, i64::MAX] {
            assert_eq!(otp_ttl(minutes), Duration::minutes(DEFAULT_OTP_TTL_MINUTES));
        }
    }
}
