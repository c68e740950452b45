use std::sync::Arc;

use axum::extract::{Extension, State};

use shared_models::auth::RequestIdentity;
use shared_models::error::AppError;
use shared_models::response::ApiResponse;
use shared_models::user::UserView;
use shared_utils::{AppState, JsonBody};

use crate::models::UpdateProfileRequest;
use crate::services::ProfileService;

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<ApiResponse<UserView>, AppError> {
    let user = ProfileService::new(&state).get_profile(identity.user_id).await?;
    Ok(ApiResponse::ok("profile fetched", user))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<ApiResponse<UserView>, AppError> {
    let user = ProfileService::new(&state)
        .update_profile(identity.user_id, request)
        .await?;
    Ok(ApiResponse::ok("profile updated", user))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Vec<UserView>>, AppError> {
    let doctors = ProfileService::new(&state).list_doctors().await?;
    Ok(ApiResponse::ok("doctors fetched", doctors))
}
