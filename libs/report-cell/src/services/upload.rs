use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use shared_database::{AppointmentRepository, ReportRepository};
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::report::MedicalReport;
use shared_utils::AppState;

use crate::models::{ReportError, ReportUpload};
use crate::services::storage::{LocalFileStore, ReportFileStore};

pub struct ReportService {
    appointments: Arc<dyn AppointmentRepository>,
    reports: Arc<dyn ReportRepository>,
    files: Arc<dyn ReportFileStore>,
    max_upload_bytes: usize,
}

impl ReportService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(state, Arc::new(LocalFileStore::new(state.config.upload_dir.clone())))
    }

    pub fn with_store(state: &AppState, files: Arc<dyn ReportFileStore>) -> Self {
        Self {
            appointments: state.appointments.clone(),
            reports: state.reports.clone(),
            files,
            max_upload_bytes: state.config.max_upload_bytes,
        }
    }

    /// Attaches a report to one of the patient's confirmed appointments.
    #[instrument(skip(self, upload), fields(file_name = %upload.file.file_name))]
    pub async fn upload(&self, patient_id: Uuid, upload: ReportUpload) -> Result<MedicalReport, ReportError> {
        let ReportUpload { appointment_id, file } = upload;

        let extension = file.allowed_extension().ok_or(ReportError::UnsupportedFileType)?;
        if file.bytes.is_empty() {
            return Err(ReportError::EmptyFile);
        }
        if file.bytes.len() > self.max_upload_bytes {
            return Err(ReportError::TooLarge { limit: self.max_upload_bytes });
        }

        let appointment_id =
            Uuid::parse_str(appointment_id.trim()).map_err(|_| ReportError::InvalidAppointmentId)?;
        let appointment = match self.appointments.find_appointment(appointment_id).await? {
            Some(appointment) if appointment.patient_id == patient_id => appointment,
            _ => {
                debug!("Appointment {} is not visible to patient {}", appointment_id, patient_id);
                return Err(ReportError::AppointmentNotFound);
            }
        };
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(ReportError::AppointmentNotConfirmed(appointment.status));
        }

        let report_id = Uuid::new_v4();
        let storage_path = self
            .files
            .save(appointment.id, report_id, &extension, &file.bytes)
            .await?;

        let report = MedicalReport {
            id: report_id,
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            content_type: file.content_type_or_guess(&extension),
            file_name: file.file_name,
            size_bytes: file.bytes.len() as u64,
            storage_path,
            uploaded_at: Utc::now(),
        };

        let report = match self.reports.insert_report(report.clone()).await {
            Ok(saved) => saved,
            Err(e) => {
                if let Err(cleanup) = self.files.remove(&report.storage_path).await {
                    error!("Orphaned report file {}: {}", report.storage_path, cleanup);
                }
                return Err(e.into());
            }
        };

        info!("Report {} uploaded for appointment {}", report.id, report.appointment_id);
        Ok(report)
    }

    /// Reports of an appointment the caller takes part in.
    pub async fn list_for_appointment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<MedicalReport>, ReportError> {
        let appointment: Appointment = self
            .appointments
            .find_appointment(appointment_id)
            .await?
            .filter(|appointment| appointment.involves(user_id))
            .ok_or(ReportError::AppointmentNotFound)?;

        Ok(self.reports.list_reports_for_appointment(appointment.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use shared_utils::test_utils::TestConfig;

    use crate::models::UploadedFile;

    async fn confirmed_appointment(state: &AppState, patient_id: Uuid) -> Appointment {
        let booked = state
            .appointments
            .insert_appointment(Appointment::book(patient_id, Uuid::new_v4(), Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        state
            .appointments
            .transition_status(booked.id, AppointmentStatus::Pending, AppointmentStatus::Confirmed)
            .await
            .unwrap()
            .unwrap()
    }

    fn upload(appointment_id: Uuid, name: &str, bytes: &[u8]) -> ReportUpload {
        ReportUpload {
            appointment_id: appointment_id.to_string(),
            file: UploadedFile {
                file_name: name.to_string(),
                content_type: Some("application/pdf".to_string()),
                bytes: bytes.to_vec(),
            },
        }
    }

    #[tokio::test]
    async fn upload_writes_file_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let state = TestConfig::with_upload_dir(dir.path()).to_state();
        let patient_id = Uuid::new_v4();
        let appointment = confirmed_appointment(&state, patient_id).await;

        let report = ReportService::new(&state)
            .upload(patient_id, upload(appointment.id, "blood-test.pdf", b"%PDF"))
            .await
            .unwrap();

        assert_eq!(report.doctor_id, appointment.doctor_id);
        assert_eq!(report.size_bytes, 4);
        assert!(dir.path().join(&report.storage_path).exists());

        let listed = ReportService::new(&state)
            .list_for_appointment(appointment.doctor_id, appointment.id)
            .await
            .unwrap();
        assert_eq!(listed, vec![report]);
    }

    #[tokio::test]
    async fn size_limit_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TestConfig::with_upload_dir(dir.path());
        config.max_upload_bytes = 8;
        let state = config.to_state();
        let patient_id = Uuid::new_v4();
        let appointment = confirmed_appointment(&state, patient_id).await;

        let result = ReportService::new(&state)
            .upload(patient_id, upload(appointment.id, "scan.png", &[0u8; 9]))
            .await;

        assert_matches!(result, Err(ReportError::TooLarge { limit: 8 }));
    }

    #[tokio::test]
    async fn pending_or_foreign_appointments_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let state = TestConfig::with_upload_dir(dir.path()).to_state();
        let patient_id = Uuid::new_v4();
        let pending = state
            .appointments
            .insert_appointment(Appointment::book(patient_id, Uuid::new_v4(), Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        let service = ReportService::new(&state);

        assert_matches!(
            service.upload(patient_id, upload(pending.id, "a.pdf", b"x")).await,
            Err(ReportError::AppointmentNotConfirmed(AppointmentStatus::Pending))
        );
        assert_matches!(
            service.upload(Uuid::new_v4(), upload(pending.id, "a.pdf", b"x")).await,
            Err(ReportError::AppointmentNotFound)
        );
        assert_matches!(
            service.list_for_appointment(Uuid::new_v4(), pending.id).await,
            Err(ReportError::AppointmentNotFound)
        );
    }
}
