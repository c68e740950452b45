use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::Role;
use shared_models::user::{UserProfile, UserRecord};

use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            upload_dir: std::env::temp_dir().join("clinic-test-uploads"),
            max_upload_bytes: 1024 * 1024,
        }
    }
}

impl TestConfig {
    pub fn with_upload_dir(upload_dir: impl Into<PathBuf>) -> Self {
        Self { upload_dir: upload_dir.into(), ..Self::default() }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_hours: 24,
            otp_ttl_minutes: 10,
            storage_backend: StorageBackend::Memory,
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            upload_dir: self.upload_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            port: 0,
        }
    }

    /// Fresh in-memory state; every call gets empty tables.
    pub fn to_state(&self) -> Arc<AppState> {
        Arc::new(AppState::in_memory(self.to_app_config()))
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    /// Stored form with an unusable password hash.
    pub fn to_record(&self) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            password_hash: "not-a-password-hash".to_string(),
            role: self.role,
            email_verified: false,
            profile: UserProfile::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts the user into `state` and returns a valid bearer header value.
    pub async fn register(&self, state: &AppState) -> String {
        state
            .users
            .insert_user(self.to_record())
            .await
            .expect("test user should insert");
        self.bearer(state)
    }

    pub fn bearer(&self, state: &AppState) -> String {
        format!(
            "Bearer {}",
            JwtTestUtils::create_test_token(self, &state.config.jwt_secret, Some(24))
        )
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        Self::create_token_from_claims(&payload, secret)
    }

    pub fn create_token_from_claims(claims: &Value, secret: &str) -> String {
        Self::sign(Algorithm::HS256, claims, secret)
    }

    pub fn create_token_with_algorithm(user: &TestUser, secret: &str, alg: Algorithm) -> String {
        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "exp": (Utc::now() + Duration::hours(1)).timestamp()
        });
        Self::sign(alg, &payload, secret)
    }

    fn sign(alg: Algorithm, claims: &Value, secret: &str) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("test token should sign")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build"),
        None => builder.body(Body::empty()).expect("request should build"),
    }
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be JSON")
    };
    (status, value)
}
