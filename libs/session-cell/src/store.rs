use tracing::{debug, info, warn};

use shared_models::auth::Role;

use crate::models::{SessionError, SessionUser};
use crate::storage::KeyValueStorage;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const USER_KEY: &str = "user";

/// The signed-in user and token, mirrored into `S`.
pub struct SessionStore<S: KeyValueStorage> {
    storage: S,
    user: Option<SessionUser>,
}

impl<S: KeyValueStorage> SessionStore<S> {
    /// Restores a session left in `storage`. A cached user that no longer
    /// parses clears both keys and starts signed out.
    pub fn open(mut storage: S) -> Result<Self, SessionError> {
        let user = match (storage.get(ACCESS_TOKEN_KEY), storage.get(USER_KEY)) {
            (Some(_), Some(raw)) => match serde_json::from_str::<SessionUser>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Cached session user is unreadable, signing out: {}", e);
                    Self::clear(&mut storage)?;
                    None
                }
            },
            (None, None) => None,
            _ => {
                debug!("Half-written session found, clearing it");
                Self::clear(&mut storage)?;
                None
            }
        };

        Ok(Self { storage, user })
    }

    pub fn login(&mut self, user: SessionUser) -> Result<(), SessionError> {
        self.storage.set(ACCESS_TOKEN_KEY, &user.access_token)?;
        self.storage.set(USER_KEY, &serde_json::to_string(&user)?)?;
        info!("Session started for {}", user.id);
        self.user = Some(user);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        Self::clear(&mut self.storage)?;
        if let Some(user) = self.user.take() {
            info!("Session ended for {}", user.id);
        }
        Ok(())
    }

    /// Replaces the cached user; the stored token is left alone.
    pub fn update_user(&mut self, user: SessionUser) -> Result<(), SessionError> {
        self.storage.set(USER_KEY, &serde_json::to_string(&user)?)?;
        self.user = Some(user);
        Ok(())
    }

    /// Forced sign-out for responses that mean the token is no longer any
    /// good. Returns whether a session was dropped.
    pub fn handle_response_status(&mut self, status: u16) -> Result<bool, SessionError> {
        if !matches!(status, 401 | 403) || !self.is_authenticated() {
            return Ok(false);
        }
        warn!("Server answered {}, dropping the session", status);
        self.logout()?;
        Ok(true)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_doctor(&self) -> bool {
        self.has_role(Role::Doctor)
    }

    pub fn is_patient(&self) -> bool {
        self.has_role(Role::Patient)
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn access_token(&self) -> Option<String> {
        self.user.as_ref().and(self.storage.get(ACCESS_TOKEN_KEY))
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn has_role(&self, role: Role) -> bool {
        self.user.as_ref().and_then(|user| user.role) == Some(role)
    }

    fn clear(storage: &mut S) -> Result<(), SessionError> {
        storage.remove(ACCESS_TOKEN_KEY)?;
        storage.remove(USER_KEY)
    }
}
