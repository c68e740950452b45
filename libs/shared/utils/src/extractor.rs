use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, State},
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use shared_models::auth::{RequestIdentity, Role};
use shared_models::error::AppError;

use crate::jwt::TokenCodec;

/// Access-control gate: verifies the session token and attaches the caller's
/// identity to the request. Any failure ends the request with a generic 403.
pub async fn auth_middleware(
    State(codec): State<Arc<TokenCodec>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claim = {
        let auth_value = request
            .headers()
            .get(AUTHORIZATION)
            .ok_or_else(|| {
                debug!("Missing authorization header");
                AppError::Authentication
            })?
            .to_str()
            .map_err(|_| {
                debug!("Authorization header is not valid UTF-8");
                AppError::Authentication
            })?;

        codec.verify(auth_value).map_err(|_| AppError::Authentication)?
    };

    request.extensions_mut().insert(RequestIdentity::from(claim));

    Ok(next.run(request).await)
}

/// Role requirement for one action, e.g. only a patient may create an
/// appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGuard {
    pub required: Role,
    pub action: &'static str,
}

impl RoleGuard {
    pub const fn new(required: Role, action: &'static str) -> Self {
        Self { required, action }
    }

    pub const fn patient(action: &'static str) -> Self {
        Self::new(Role::Patient, action)
    }

    pub const fn doctor(action: &'static str) -> Self {
        Self::new(Role::Doctor, action)
    }

    /// A missing identity or role counts as a mismatch.
    pub fn check(&self, identity: Option<&RequestIdentity>) -> Result<(), AppError> {
        match identity {
            Some(identity) if identity.has_role(self.required) => Ok(()),
            _ => Err(AppError::authorization(self.required, self.action)),
        }
    }
}

/// Middleware form of [`RoleGuard`]; must be layered inside `auth_middleware`.
pub async fn role_guard(
    State(guard): State<RoleGuard>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    guard.check(request.extensions().get::<RequestIdentity>())?;
    Ok(next.run(request).await)
}

/// `Json<T>` whose rejection is a 400 in the standard envelope instead of
/// axum's plain-text response.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                Err(AppError::ValidationError(rejection.body_text()))
            }
        }
    }
}
