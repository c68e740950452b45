use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::{UserRepository, VerificationRepository};
use shared_models::auth::Role;
use shared_models::user::{normalize_email, UserView};
use shared_utils::validation::is_valid_email;
use shared_utils::AppState;

use crate::models::{ProfileError, UpdateProfileRequest};

pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    verifications: Arc<dyn VerificationRepository>,
}

impl ProfileService {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            verifications: state.verifications.clone(),
        }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserView, ProfileError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(ProfileError::NotFound)?;
        Ok(user.view())
    }

    /// Applies a partial update. A new e-mail must be unused and has to be
    /// verified again.
    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserView, ProfileError> {
        let mut user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(ProfileError::NotFound)?;

        if let Some(name) = request.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ProfileError::Validation("name must not be empty".to_string()));
            }
            user.name = name.to_string();
        }

        let mut email_changed = false;
        if let Some(email) = request.email {
            let email = normalize_email(&email);
            if !is_valid_email(&email) {
                return Err(ProfileError::Validation("email address is not valid".to_string()));
            }
            if email != user.email {
                if let Some(owner) = self.users.find_user_by_email(&email).await? {
                    debug!("Email change for {} collides with {}", user_id, owner.id);
                    return Err(ProfileError::EmailTaken);
                }
                user.email = email;
                user.email_verified = false;
                email_changed = true;
            }
        }

        if let Some(profile) = request.profile {
            user.profile.merge(profile);
        }

        user.updated_at = Utc::now();
        let user = self.users.update_user(user).await?;

        if email_changed {
            // Outstanding codes went to the old address.
            self.verifications.delete_verification(user_id).await?;
        }

        info!("Profile updated for {}", user_id);
        Ok(user.view())
    }

    pub async fn list_doctors(&self) -> Result<Vec<UserView>, ProfileError> {
        let mut doctors: Vec<UserView> = self
            .users
            .list_users_by_role(Role::Doctor)
            .await?
            .iter()
            .map(|user| user.view())
            .collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(doctors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::user::{EmailVerification, UserProfile};
    use shared_utils::test_utils::{TestConfig, TestUser};

    #[tokio::test]
    async fn email_change_resets_verification() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("p@example.com");
        let mut record = user.to_record();
        record.email_verified = true;
        state.users.insert_user(record).await.unwrap();

        let view = ProfileService::new(&state)
            .update_profile(
                user.id,
                UpdateProfileRequest {
                    email: Some("New@Example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(view.email, "new@example.com");
        assert!(!view.email_verified);
    }

    #[tokio::test]
    async fn email_change_discards_outstanding_code() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("old@example.com");
        user.register(&state).await;
        state
            .verifications
            .save_verification(EmailVerification::new(
                user.id,
                &user.email,
                "123456".to_string(),
                Utc::now() + chrono::Duration::minutes(10),
            ))
            .await
            .unwrap();

        ProfileService::new(&state)
            .update_profile(
                user.id,
                UpdateProfileRequest {
                    email: Some("new@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(state.verifications.find_verification(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn same_email_keeps_verification() {
        let state = TestConfig::default().to_state();
        let user = TestUser::patient("p@example.com");
        let mut record = user.to_record();
        record.email_verified = true;
        state.users.insert_user(record).await.unwrap();

        let view = ProfileService::new(&state)
            .update_profile(
                user.id,
                UpdateProfileRequest {
                    email: Some("P@example.com".to_string()),
                    profile: Some(UserProfile { age: Some(41), ..Default::default() }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(view.email_verified);
        assert_eq!(view.profile.age, Some(41));
    }

    #[tokio::test]
    async fn taken_email_conflicts() {
        let state = TestConfig::default().to_state();
        let first = TestUser::patient("first@example.com");
        let second = TestUser::patient("second@example.com");
        first.register(&state).await;
        second.register(&state).await;

        let result = ProfileService::new(&state)
            .update_profile(
                second.id,
                UpdateProfileRequest {
                    email: Some("first@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert_matches!(result, Err(ProfileError::EmailTaken));
    }

    #[tokio::test]
    async fn doctors_sorted_by_name() {
        let state = TestConfig::default().to_state();
        TestUser::doctor("zhivago@example.com").register(&state).await;
        TestUser::doctor("akiba@example.com").register(&state).await;
        TestUser::patient("molly@example.com").register(&state).await;

        let doctors = ProfileService::new(&state).list_doctors().await.unwrap();
        let names: Vec<_> = doctors.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(names, vec!["akiba", "zhivago"]);
    }
}
