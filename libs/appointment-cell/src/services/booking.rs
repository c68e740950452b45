use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppointmentRepository, UserRepository};
use shared_models::appointment::Appointment;
use shared_models::auth::{RequestIdentity, Role};
use shared_utils::AppState;

use crate::models::{AppointmentError, CreateAppointmentRequest, UpdateAppointmentRequest};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentRepository>,
    users: Arc<dyn UserRepository>,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            appointments: state.appointments.clone(),
            users: state.users.clone(),
            lifecycle_service: AppointmentLifecycleService::new(),
        }
    }

    /// Books a pending appointment for the calling patient.
    #[instrument(skip(self, request), fields(patient_id = %patient_id))]
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.book_appointment_at(patient_id, request, Utc::now()).await
    }

    pub async fn book_appointment_at(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let date_time = request.date_time.to_utc()?;
        if date_time <= now {
            return Err(AppointmentError::InvalidTime(
                "appointment must be in the future".to_string(),
            ));
        }

        match self.users.find_user(request.doctor_id).await? {
            Some(doctor) if doctor.role == Role::Doctor => {}
            _ => {
                debug!("No doctor with id {}", request.doctor_id);
                return Err(AppointmentError::DoctorNotFound);
            }
        }

        let appointment = self
            .appointments
            .insert_appointment(Appointment::book(patient_id, request.doctor_id, date_time))
            .await?;

        info!(
            "Appointment {} booked with doctor {} at {}",
            appointment.id, appointment.doctor_id, appointment.date_time
        );
        Ok(appointment)
    }

    /// Appointments of the caller, as doctor or as patient depending on
    /// `requested_role`, which must be the caller's own role.
    pub async fn list_for_role(
        &self,
        identity: &RequestIdentity,
        requested_role: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let role: Role = requested_role
            .parse()
            .map_err(|_| AppointmentError::UnknownRole(requested_role.to_string()))?;

        if !identity.has_role(role) {
            return Err(AppointmentError::RoleMismatch(role));
        }

        let appointments = self
            .appointments
            .list_appointments_for(role, identity.user_id)
            .await?;
        debug!("Found {} appointments for {} {}", appointments.len(), role, identity.user_id);
        Ok(appointments)
    }

    /// Confirms or cancels one of the calling doctor's pending appointments.
    #[instrument(skip(self, request), fields(doctor_id = %doctor_id))]
    pub async fn update_status(
        &self,
        doctor_id: Uuid,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let next = self.lifecycle_service.parse_requested_status(&request.status)?;

        let current = match self.appointments.find_appointment(appointment_id).await? {
            Some(appointment) if appointment.doctor_id == doctor_id => appointment,
            _ => return Err(AppointmentError::NotFound),
        };

        self.lifecycle_service
            .validate_status_transition(current.status, next)?;

        let updated = self
            .appointments
            .transition_status(appointment_id, current.status, next)
            .await?
            .ok_or_else(|| {
                warn!("Appointment {} changed status before {} could apply", appointment_id, next);
                AppointmentError::ConcurrentModification
            })?;

        info!("Appointment {} is now {}", updated.id, updated.status);
        Ok(updated)
    }
}
