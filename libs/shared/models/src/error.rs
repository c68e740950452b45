use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::Role;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing, malformed, expired or forged session token.
    #[error("invalid access")]
    Authentication,

    /// Authenticated caller holds the wrong role for the action.
    #[error("only {required} can {action}")]
    Authorization { required: Role, action: String },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    pub fn authorization(required: Role, action: impl Into<String>) -> Self {
        AppError::Authorization { required, action: action.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication => StatusCode::FORBIDDEN,
            AppError::Authorization { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// `(message, error)` pair of the response envelope. Server-side failures
    /// only expose a generic description.
    fn envelope_parts(&self) -> (&'static str, String) {
        match self {
            AppError::Authentication => ("authentication failed", self.to_string()),
            AppError::Authorization { .. } => ("unauthorized access", self.to_string()),
            AppError::InvalidCredentials => ("authentication failed", self.to_string()),
            AppError::NotFound(msg) => ("not found", msg.clone()),
            AppError::ValidationError(msg) => ("validation failed", msg.clone()),
            AppError::Conflict(msg) => ("conflict", msg.clone()),
            AppError::Database(_) | AppError::Internal(_) => {
                ("internal server error", "something went wrong".to_string())
            }
            AppError::ExternalService(_) => {
                ("external service error", "upstream service unavailable".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, self);
        } else {
            tracing::debug!("Rejected: {}: {}", status, self);
        }

        let (message, error) = self.envelope_parts();
        let body = Json(json!({
            "message": message,
            "error": error,
            "data": null
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn authentication_failure_is_generic_403() {
        let (status, body) = body_of(AppError::Authentication).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "authentication failed");
        assert_eq!(body["error"], "invalid access");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn authorization_failure_names_required_role() {
        let (status, body) =
            body_of(AppError::authorization(Role::Doctor, "update appointment")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "unauthorized access");
        assert_eq!(body["error"], "only doctor can update appointment");
    }

    #[tokio::test]
    async fn internal_detail_is_not_exposed() {
        let (status, body) = body_of(AppError::Database("connection refused on 10.0.0.3".into())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "something went wrong");
    }
}
