use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use shared_database::RepositoryError;
use shared_models::appointment::AppointmentStatus;
use shared_models::auth::Role;
use shared_models::error::AppError;

/// Booking payload. `patientId` and `status` may be present but are never
/// read; the patient comes from the session and new bookings start pending.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub date_time: DateTimeInput,
}

/// Appointment time as sent by clients: RFC 3339, a naive
/// `YYYY-MM-DDTHH:MM[:SS]` (taken as UTC), or epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DateTimeInput {
    Millis(i64),
    Text(String),
}

impl DateTimeInput {
    pub fn to_utc(&self) -> Result<DateTime<Utc>, AppointmentError> {
        match self {
            DateTimeInput::Millis(millis) => from_millis(*millis),
            DateTimeInput::Text(text) => parse_text(text.trim()),
        }
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, AppointmentError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| AppointmentError::InvalidTime(format!("{} is out of range", millis)))
}

fn parse_text(text: &str) -> Result<DateTime<Utc>, AppointmentError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(millis) = text.parse::<i64>() {
        return from_millis(millis);
    }
    Err(AppointmentError::InvalidTime(format!("'{}' is not a recognised date-time", text)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub status: String,
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Unknown appointment status: {0}")]
    UnknownStatus(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Appointment cannot be moved from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment status changed concurrently")]
    ConcurrentModification,

    #[error("only {0} can list {0} appointments")]
    RoleMismatch(Role),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::DoctorNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::InvalidTime(_)
            | AppointmentError::UnknownStatus(_)
            | AppointmentError::UnknownRole(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::InvalidStatusTransition { to: AppointmentStatus::Pending, .. } => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::ConcurrentModification => AppError::Conflict(err.to_string()),
            AppointmentError::RoleMismatch(role) => {
                AppError::authorization(role, format!("list {} appointments", role))
            }
            AppointmentError::Repository(repo_err) => repo_err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<DateTime<Utc>, AppointmentError> {
        serde_json::from_value::<DateTimeInput>(value).unwrap().to_utc()
    }

    #[test]
    fn accepts_every_supported_time_form() {
        let expected = Utc.with_ymd_and_hms(2030, 5, 17, 9, 30, 0).unwrap();

        assert_eq!(parse(json!("2030-05-17T09:30:00Z")).unwrap(), expected);
        assert_eq!(parse(json!("2030-05-17T11:30:00+02:00")).unwrap(), expected);
        assert_eq!(parse(json!("2030-05-17T09:30")).unwrap(), expected);
        assert_eq!(parse(json!("2030-05-17T09:30:00")).unwrap(), expected);
        assert_eq!(parse(json!(expected.timestamp_millis())).unwrap(), expected);
        assert_eq!(parse(json!(expected.timestamp_millis().to_string())).unwrap(), expected);
    }

    #[test]
    fn rejects_garbage_time() {
        assert_matches!(parse(json!("next tuesday")), Err(AppointmentError::InvalidTime(_)));
    }

    #[test]
    fn create_payload_ignores_status_and_patient() {
        let request: CreateAppointmentRequest = serde_json::from_value(json!({
            "doctorId": Uuid::new_v4(),
            "dateTime": "2030-05-17T09:30",
            "status": "confirmed",
            "patientId": Uuid::new_v4()
        }))
        .unwrap();

        assert_eq!(request.date_time, DateTimeInput::Text("2030-05-17T09:30".into()));
    }

    #[test]
    fn error_statuses() {
        use axum::http::StatusCode;

        let conflict: AppError = AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Confirmed,
            to: AppointmentStatus::Cancelled,
        }
        .into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let back_to_pending: AppError = AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Pending,
            to: AppointmentStatus::Pending,
        }
        .into();
        assert_eq!(back_to_pending.status(), StatusCode::BAD_REQUEST);

        let mismatch: AppError = AppointmentError::RoleMismatch(Role::Doctor).into();
        assert_eq!(mismatch.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(mismatch.to_string(), "only doctor can list doctor appointments");
    }
}
