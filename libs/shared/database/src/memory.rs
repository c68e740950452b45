use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::auth::Role;
use shared_models::report::MedicalReport;
use shared_models::user::{EmailVerification, UserRecord};

use crate::repository::{
    AppointmentRepository, ReportRepository, RepositoryError, RepositoryResult, UserRepository,
    VerificationRepository,
};

/// Process-local storage. Used for development and in tests.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    reports: RwLock<Vec<MedicalReport>>,
    verifications: RwLock<HashMap<Uuid, EmailVerification>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: UserRecord) -> RepositoryResult<UserRecord> {
        let mut users = self.users.write().await;

        if users.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }

        users.insert(user.id, user.clone());
        debug!("Stored user {}", user.id);
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> RepositoryResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn update_user(&self, user: UserRecord) -> RepositoryResult<UserRecord> {
        let mut users = self.users.write().await;

        if !users.contains_key(&user.id) {
            return Err(RepositoryError::NotFound);
        }
        if users
            .values()
            .any(|existing| existing.id != user.id && existing.email == user.email)
        {
            return Err(RepositoryError::DuplicateEmail);
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users_by_role(&self, role: Role) -> RepositoryResult<Vec<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.values().filter(|user| user.role == role).cloned().collect())
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryStore {
    async fn insert_appointment(&self, appointment: Appointment) -> RepositoryResult<Appointment> {
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find_appointment(&self, id: Uuid) -> RepositoryResult<Option<Appointment>> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn list_appointments_for(
        &self,
        role: Role,
        user_id: Uuid,
    ) -> RepositoryResult<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut matching: Vec<Appointment> = appointments
            .values()
            .filter(|appointment| match role {
                Role::Patient => appointment.patient_id == user_id,
                Role::Doctor => appointment.doctor_id == user_id,
            })
            .cloned()
            .collect();

        matching.sort_by_key(|appointment| appointment.date_time);
        Ok(matching)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> RepositoryResult<Option<Appointment>> {
        let mut appointments = self.appointments.write().await;

        match appointments.get_mut(&id) {
            Some(appointment) if appointment.status == expected => {
                appointment.status = next;
                appointment.updated_at = Utc::now();
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl ReportRepository for InMemoryStore {
    async fn insert_report(&self, report: MedicalReport) -> RepositoryResult<MedicalReport> {
        self.reports.write().await.push(report.clone());
        Ok(report)
    }

    async fn list_reports_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> RepositoryResult<Vec<MedicalReport>> {
        let reports = self.reports.read().await;
        Ok(reports
            .iter()
            .filter(|report| report.appointment_id == appointment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VerificationRepository for InMemoryStore {
    async fn save_verification(&self, verification: EmailVerification) -> RepositoryResult<()> {
        self.verifications
            .write()
            .await
            .insert(verification.user_id, verification);
        Ok(())
    }

    async fn find_verification(&self, user_id: Uuid) -> RepositoryResult<Option<EmailVerification>> {
        Ok(self.verifications.read().await.get(&user_id).cloned())
    }

    async fn delete_verification(&self, user_id: Uuid) -> RepositoryResult<()> {
        self.verifications.write().await.remove(&user_id);
        Ok(())
    }

    async fn claim_attempt(
        &self,
        user_id: Uuid,
        seen: u32,
    ) -> RepositoryResult<Option<EmailVerification>> {
        let mut verifications = self.verifications.write().await;

        match verifications.get_mut(&user_id) {
            Some(verification) if verification.attempts == seen => {
                verification.attempts = seen.saturating_add(1);
                Ok(Some(verification.clone()))
            }
            _ => Ok(None),
        }
    }
}
