use thiserror::Error;

use shared_database::RepositoryError;
use shared_models::appointment::AppointmentStatus;
use shared_models::error::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["pdf", "jpg", "jpeg", "png", "doc", "docx"];

/// A file part pulled out of the multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Lower-cased extension, if it is one we accept.
    pub fn allowed_extension(&self) -> Option<String> {
        let (_, extension) = self.file_name.rsplit_once('.')?;
        let extension = extension.to_ascii_lowercase();
        ALLOWED_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(extension)
    }

    pub fn content_type_or_guess(&self, extension: &str) -> String {
        if let Some(content_type) = self.content_type.as_deref().filter(|c| !c.is_empty()) {
            return content_type.to_string();
        }
        match extension {
            "pdf" => "application/pdf",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "doc" => "application/msword",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            _ => "application/octet-stream",
        }
        .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ReportUpload {
    pub appointment_id: String,
    pub file: UploadedFile,
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("missing form field '{0}'")]
    MissingField(&'static str),

    #[error("malformed upload: {0}")]
    Malformed(String),

    #[error("file type not allowed; expected one of {}", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedFileType,

    #[error("file is empty")]
    EmptyFile,

    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("appointment id must be a UUID")]
    InvalidAppointmentId,

    #[error("appointment not found")]
    AppointmentNotFound,

    #[error("reports can only be attached to confirmed appointments (this one is {0})")]
    AppointmentNotConfirmed(AppointmentStatus),

    #[error("file storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::MissingField(_)
            | ReportError::Malformed(_)
            | ReportError::UnsupportedFileType
            | ReportError::EmptyFile
            | ReportError::TooLarge { .. }
            | ReportError::InvalidAppointmentId => AppError::ValidationError(err.to_string()),
            ReportError::AppointmentNotFound => AppError::NotFound(err.to_string()),
            ReportError::AppointmentNotConfirmed(_) => AppError::Conflict(err.to_string()),
            ReportError::Storage(msg) => AppError::Internal(msg),
            ReportError::Repository(repo_err) => repo_err.into(),
        }
    }
}
