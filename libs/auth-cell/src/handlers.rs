use std::sync::Arc;

use axum::extract::{Extension, State};
use tracing::{debug, info};

use shared_models::auth::RequestIdentity;
use shared_models::error::AppError;
use shared_models::response::ApiResponse;
use shared_models::user::UserView;
use shared_utils::{AppState, JsonBody};

use crate::models::{LoginRequest, LoginResponse, SignupRequest, SubmitOtpRequest, VerificationIssued};
use crate::services::{AccountService, EmailVerificationService};

pub async fn signup(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<SignupRequest>,
) -> Result<ApiResponse<UserView>, AppError> {
    let user = AccountService::new(&state).signup(request).await?;
    Ok(ApiResponse::created("user registered", user))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let response = AccountService::new(&state).login(request).await?;
    Ok(ApiResponse::ok("login successful", response))
}

/// Tokens are not tracked server side; the client discards its session.
pub async fn logout(
    Extension(identity): Extension<RequestIdentity>,
) -> ApiResponse<Option<()>> {
    info!("User {} logged out", identity.user_id);
    ApiResponse::ok("logout successful", None)
}

pub async fn request_email_verification(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<ApiResponse<VerificationIssued>, AppError> {
    debug!("Verification code requested by {}", identity.user_id);
    let issued = EmailVerificationService::new(&state)
        .request(identity.user_id)
        .await?;
    Ok(ApiResponse::ok("verification code sent", issued))
}

pub async fn submit_email_verification(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    JsonBody(request): JsonBody<SubmitOtpRequest>,
) -> Result<ApiResponse<UserView>, AppError> {
    let user = EmailVerificationService::new(&state)
        .submit(identity.user_id, &request.otp)
        .await?;
    Ok(ApiResponse::ok("email verified", user))
}
