use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::UserRepository;
use shared_models::auth::Role;
use shared_models::user::{normalize_email, UserRecord, UserView};
use shared_utils::validation::is_valid_email;
use shared_utils::{AppState, TokenCodec};

use crate::models::{AuthError, LoginRequest, LoginResponse, SignupRequest};
use crate::services::password::PasswordService;

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AuthError::Validation("email address is not valid".to_string()))
    }
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    codec: Arc<TokenCodec>,
}

impl AccountService {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            codec: state.codec.clone(),
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: SignupRequest) -> Result<UserView, AuthError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AuthError::Validation("name is required".to_string()));
        }

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        PasswordService::check_length(&request.password).map_err(AuthError::Validation)?;

        let role: Role = request
            .role
            .trim()
            .parse()
            .map_err(|_| AuthError::Validation("role must be 'patient' or 'doctor'".to_string()))?;

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        let now = Utc::now();
        let user = self
            .users
            .insert_user(UserRecord {
                id: Uuid::new_v4(),
                name,
                email,
                password_hash,
                role,
                email_verified: false,
                profile: request.profile.unwrap_or_default(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("Registered {} {}", user.role, user.id);
        Ok(user.view())
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        let email = normalize_email(&request.email);

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            debug!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let matches = PasswordService::verify_password(&request.password, &user.password_hash)
            .unwrap_or_else(|e| {
                warn!("Stored password hash for {} is unusable: {}", user.id, e);
                false
            });
        if !matches {
            debug!("Wrong password for {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.codec.issue(user.id, &user.email, user.role)?;

        info!("User {} logged in", user.id);
        Ok(LoginResponse {
            access_token,
            user: user.view(),
        })
    }
}
