use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::auth::Role;
use shared_models::report::MedicalReport;
use shared_models::user::{EmailVerification, UserProfile, UserRecord};

use crate::repository::{
    AppointmentRepository, ReportRepository, RepositoryError, RepositoryResult, UserRepository,
    VerificationRepository,
};

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT: &str = "resolution=merge-duplicates,return=minimal";

/// Non-2xx answer from PostgREST, carried inside `anyhow::Error`.
#[derive(Debug)]
pub struct ApiStatusError {
    pub status: StatusCode,
    pub body: String,
}

impl std::fmt::Display for ApiStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API error ({}): {}", self.status, self.body)
    }
}

impl std::error::Error for ApiStatusError {}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(prefer) = prefer {
            headers.insert("Prefer", HeaderValue::from_str(prefer)?);
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers(prefer)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.context("PostgREST request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(ApiStatusError { status, body: error_text }.into());
        }

        Ok(response)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, prefer).await?;
        let data = response.json::<T>().await.context("Invalid PostgREST payload")?;
        Ok(data)
    }

    /// Request whose response body is ignored.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<()> {
        self.send(method, path, body, prefer).await.map(|_| ())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

// Table rows, in the snake_case shape PostgREST serves.

#[derive(Debug, Serialize, Deserialize)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: Role,
    email_verified: bool,
    #[serde(default)]
    profile: UserProfile,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserRow {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            email_verified: user.email_verified,
            profile: user.profile,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role,
            email_verified: row.email_verified,
            profile: row.profile,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AppointmentRow {
    id: Uuid,
    doctor_id: Uuid,
    patient_id: Uuid,
    date_time: DateTime<Utc>,
    status: AppointmentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentRow {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            doctor_id: a.doctor_id,
            patient_id: a.patient_id,
            date_time: a.date_time,
            status: a.status,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Self {
            id: row.id,
            doctor_id: row.doctor_id,
            patient_id: row.patient_id,
            date_time: row.date_time,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ReportRow {
    id: Uuid,
    appointment_id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    file_name: String,
    content_type: String,
    size_bytes: i64,
    storage_path: String,
    uploaded_at: DateTime<Utc>,
}

impl From<MedicalReport> for ReportRow {
    fn from(r: MedicalReport) -> Self {
        Self {
            id: r.id,
            appointment_id: r.appointment_id,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            file_name: r.file_name,
            content_type: r.content_type,
            size_bytes: r.size_bytes as i64,
            storage_path: r.storage_path,
            uploaded_at: r.uploaded_at,
        }
    }
}

impl From<ReportRow> for MedicalReport {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            appointment_id: row.appointment_id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            file_name: row.file_name,
            content_type: row.content_type,
            size_bytes: row.size_bytes.max(0) as u64,
            storage_path: row.storage_path,
            uploaded_at: row.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct VerificationRow {
    user_id: Uuid,
    email: String,
    otp: String,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    attempts: i32,
}

impl From<EmailVerification> for VerificationRow {
    fn from(verification: EmailVerification) -> Self {
        Self {
            user_id: verification.user_id,
            email: verification.email,
            otp: verification.otp,
            expires_at: verification.expires_at,
            attempts: i32::try_from(verification.attempts).unwrap_or(i32::MAX),
        }
    }
}

impl From<VerificationRow> for EmailVerification {
    fn from(row: VerificationRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            otp: row.otp,
            expires_at: row.expires_at,
            attempts: row.attempts.max(0) as u32,
        }
    }
}

/// Repositories backed by Supabase tables `users`, `appointments`,
/// `medical_reports` and `email_verifications`.
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self { client: SupabaseClient::new(config) }
    }

    async fn select<R: DeserializeOwned>(&self, path: &str) -> RepositoryResult<Vec<R>> {
        self.client
            .request::<Vec<R>>(Method::GET, path, None, None)
            .await
            .map_err(backend_error)
    }

    async fn write<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> RepositoryResult<Vec<R>> {
        self.client
            .request::<Vec<R>>(method, path, Some(body), Some(RETURN_REPRESENTATION))
            .await
            .map_err(backend_error)
    }

    async fn write_user(&self, method: Method, path: &str, body: Value) -> RepositoryResult<Vec<UserRow>> {
        self.client
            .request::<Vec<UserRow>>(method, path, Some(body), Some(RETURN_REPRESENTATION))
            .await
            .map_err(user_write_error)
    }
}

fn to_body<T: Serialize>(row: &T) -> RepositoryResult<Value> {
    serde_json::to_value(row).map_err(|e| RepositoryError::Backend(e.to_string()))
}

fn first<R, T: From<R>>(rows: Vec<R>) -> RepositoryResult<T> {
    rows.into_iter()
        .next()
        .map(T::from)
        .ok_or_else(|| RepositoryError::Backend("empty representation returned".to_string()))
}

const UNIQUE_VIOLATION: &str = "23505";

fn backend_error(err: anyhow::Error) -> RepositoryError {
    RepositoryError::Backend(err.to_string())
}

// The only unique column written through `users` besides the key is `email`.
fn user_write_error(err: anyhow::Error) -> RepositoryError {
    match err.downcast_ref::<ApiStatusError>() {
        Some(status_error) if is_unique_violation(status_error) => RepositoryError::DuplicateEmail,
        _ => backend_error(err),
    }
}

fn is_unique_violation(status_error: &ApiStatusError) -> bool {
    status_error.status == StatusCode::CONFLICT
        && serde_json::from_str::<Value>(&status_error.body)
            .ok()
            .and_then(|body| body.get("code").and_then(Value::as_str).map(|code| code == UNIQUE_VIOLATION))
            .unwrap_or(false)
}

#[async_trait]
impl UserRepository for SupabaseStore {
    async fn insert_user(&self, user: UserRecord) -> RepositoryResult<UserRecord> {
        let body = to_body(&UserRow::from(user))?;
        let rows = self.write_user(Method::POST, "/rest/v1/users", body).await?;
        first(rows)
    }

    async fn find_user(&self, id: Uuid) -> RepositoryResult<Option<UserRecord>> {
        let rows: Vec<UserRow> = self
            .select(&format!("/rest/v1/users?id=eq.{}&select=*", id))
            .await?;
        Ok(rows.into_iter().next().map(UserRecord::from))
    }

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<UserRecord>> {
        let rows: Vec<UserRow> = self
            .select(&format!(
                "/rest/v1/users?email=eq.{}&select=*",
                urlencoding::encode(email)
            ))
            .await?;
        Ok(rows.into_iter().next().map(UserRecord::from))
    }

    async fn update_user(&self, user: UserRecord) -> RepositoryResult<UserRecord> {
        let path = format!("/rest/v1/users?id=eq.{}", user.id);
        let body = to_body(&UserRow::from(user))?;
        let rows = self.write_user(Method::PATCH, &path, body).await?;
        rows.into_iter()
            .next()
            .map(UserRecord::from)
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_users_by_role(&self, role: Role) -> RepositoryResult<Vec<UserRecord>> {
        let rows: Vec<UserRow> = self
            .select(&format!("/rest/v1/users?role=eq.{}&select=*", role))
            .await?;
        Ok(rows.into_iter().map(UserRecord::from).collect())
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseStore {
    async fn insert_appointment(&self, appointment: Appointment) -> RepositoryResult<Appointment> {
        let body = to_body(&AppointmentRow::from(appointment))?;
        let rows: Vec<AppointmentRow> = self.write(Method::POST, "/rest/v1/appointments", body).await?;
        first(rows)
    }

    async fn find_appointment(&self, id: Uuid) -> RepositoryResult<Option<Appointment>> {
        let rows: Vec<AppointmentRow> = self
            .select(&format!("/rest/v1/appointments?id=eq.{}&select=*", id))
            .await?;
        Ok(rows.into_iter().next().map(Appointment::from))
    }

    async fn list_appointments_for(
        &self,
        role: Role,
        user_id: Uuid,
    ) -> RepositoryResult<Vec<Appointment>> {
        let column = match role {
            Role::Patient => "patient_id",
            Role::Doctor => "doctor_id",
        };
        let rows: Vec<AppointmentRow> = self
            .select(&format!(
                "/rest/v1/appointments?{}=eq.{}&select=*&order=date_time.asc",
                column, user_id
            ))
            .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> RepositoryResult<Option<Appointment>> {
        // The status filter makes the write conditional; no row back means
        // someone else moved the appointment first.
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);
        let body = json!({ "status": next, "updated_at": Utc::now() });
        let rows: Vec<AppointmentRow> = self.write(Method::PATCH, &path, body).await?;
        Ok(rows.into_iter().next().map(Appointment::from))
    }
}

#[async_trait]
impl ReportRepository for SupabaseStore {
    async fn insert_report(&self, report: MedicalReport) -> RepositoryResult<MedicalReport> {
        let body = to_body(&ReportRow::from(report))?;
        let rows: Vec<ReportRow> = self.write(Method::POST, "/rest/v1/medical_reports", body).await?;
        first(rows)
    }

    async fn list_reports_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> RepositoryResult<Vec<MedicalReport>> {
        let rows: Vec<ReportRow> = self
            .select(&format!(
                "/rest/v1/medical_reports?appointment_id=eq.{}&select=*&order=uploaded_at.asc",
                appointment_id
            ))
            .await?;
        Ok(rows.into_iter().map(MedicalReport::from).collect())
    }
}

#[async_trait]
impl VerificationRepository for SupabaseStore {
    async fn save_verification(&self, verification: EmailVerification) -> RepositoryResult<()> {
        let row = VerificationRow::from(verification);
        self.client
            .execute(
                Method::POST,
                "/rest/v1/email_verifications",
                Some(to_body(&row)?),
                Some(UPSERT),
            )
            .await
            .map_err(backend_error)
    }

    async fn find_verification(&self, user_id: Uuid) -> RepositoryResult<Option<EmailVerification>> {
        let rows: Vec<VerificationRow> = self
            .select(&format!("/rest/v1/email_verifications?user_id=eq.{}&select=*", user_id))
            .await?;
        Ok(rows.into_iter().next().map(EmailVerification::from))
    }

    async fn delete_verification(&self, user_id: Uuid) -> RepositoryResult<()> {
        self.client
            .execute(
                Method::DELETE,
                &format!("/rest/v1/email_verifications?user_id=eq.{}", user_id),
                None,
                None,
            )
            .await
            .map_err(backend_error)
    }

    async fn claim_attempt(
        &self,
        user_id: Uuid,
        seen: u32,
    ) -> RepositoryResult<Option<EmailVerification>> {
        let path = format!(
            "/rest/v1/email_verifications?user_id=eq.{}&attempts=eq.{}",
            user_id, seen
        );
        let body = json!({ "attempts": seen.saturating_add(1) });
        let rows: Vec<VerificationRow> = self.write(Method::PATCH, &path, body).await?;
        Ok(rows.into_iter().next().map(EmailVerification::from))
    }
}
