use std::sync::Arc;

use axum::extract::{multipart::Field, Extension, Multipart, Path, State};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::RequestIdentity;
use shared_models::error::AppError;
use shared_models::report::MedicalReport;
use shared_models::response::ApiResponse;
use shared_utils::AppState;

use crate::models::{ReportError, ReportUpload, UploadedFile};
use crate::services::ReportService;

const FILE_FIELD: &str = "reportFile";
const APPOINTMENT_FIELD: &str = "appointmentId";

async fn read_upload(mut multipart: Multipart) -> Result<ReportUpload, ReportError> {
    let mut appointment_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => file = Some(read_file(field).await?),
            Some(APPOINTMENT_FIELD) => appointment_id = Some(field.text().await.map_err(malformed)?),
            other => debug!("Ignoring form field {:?}", other),
        }
    }

    Ok(ReportUpload {
        appointment_id: appointment_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ReportError::MissingField(APPOINTMENT_FIELD))?,
        file: file.ok_or(ReportError::MissingField(FILE_FIELD))?,
    })
}

async fn read_file(field: Field<'_>) -> Result<UploadedFile, ReportError> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .ok_or(ReportError::MissingField(FILE_FIELD))?;
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(malformed)?;

    Ok(UploadedFile { file_name, content_type, bytes: bytes.to_vec() })
}

fn malformed(err: axum::extract::multipart::MultipartError) -> ReportError {
    ReportError::Malformed(err.body_text())
}

#[axum::debug_handler]
pub async fn upload_report(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    multipart: Multipart,
) -> Result<ApiResponse<MedicalReport>, AppError> {
    let upload = read_upload(multipart).await?;
    let report = ReportService::new(&state)
        .upload(identity.user_id, upload)
        .await?;
    Ok(ApiResponse::created("report uploaded", report))
}

#[axum::debug_handler]
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<RequestIdentity>,
    Path(appointment_id): Path<String>,
) -> Result<ApiResponse<Vec<MedicalReport>>, AppError> {
    let appointment_id =
        Uuid::parse_str(&appointment_id).map_err(|_| ReportError::InvalidAppointmentId)?;
    let reports = ReportService::new(&state)
        .list_for_appointment(identity.user_id, appointment_id)
        .await?;
    Ok(ApiResponse::ok("reports fetched", reports))
}
