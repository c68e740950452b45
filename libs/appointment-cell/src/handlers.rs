use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use tracing::debug;
use uuid::Uuid;

use shared_models::appointment::Appointment;
use shared_models::auth::RequestIdentity;
use shared_models::error::AppError;
use shared_models::response::ApiResponse;
use shared_utils::{AppState, JsonBody};

use crate::models::{CreateAppointmentRequest, UpdateAppointmentRequest};
use crate::services::AppointmentBookingService;

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    JsonBody(request): JsonBody<CreateAppointmentRequest>,
) -> Result<ApiResponse<Appointment>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .book_appointment(identity.user_id, request)
        .await?;
    Ok(ApiResponse::created("appointment created", appointment))
}

/// `GET /{role}`: the caller's appointments seen as `role`.
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(role): Path<String>,
) -> Result<ApiResponse<Vec<Appointment>>, AppError> {
    let appointments = AppointmentBookingService::new(&state)
        .list_for_role(&identity, &role)
        .await?;
    Ok(ApiResponse::ok("appointments fetched", appointments))
}

/// `PUT /{id}`: confirm or cancel.
#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(appointment_id): Path<String>,
    JsonBody(request): JsonBody<UpdateAppointmentRequest>,
) -> Result<ApiResponse<Appointment>, AppError> {
    let appointment_id = Uuid::parse_str(&appointment_id).map_err(|_| {
        debug!("Rejected appointment id {}", appointment_id);
        AppError::ValidationError("appointment id must be a UUID".to_string())
    })?;

    let appointment = AppointmentBookingService::new(&state)
        .update_status(identity.user_id, appointment_id, request)
        .await?;
    Ok(ApiResponse::ok("appointment updated", appointment))
}
