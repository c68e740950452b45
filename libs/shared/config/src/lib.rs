use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
const DEFAULT_OTP_TTL_MINUTES: i64 = 10;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_PORT: u16 = 5000;

const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;
const MAX_OTP_TTL_MINUTES: i64 = 24 * 60;
const MAX_UPLOAD_BYTES_LIMIT: usize = 1024 * 1024 * 1024;

/// Where persisted records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub otp_ttl_minutes: i64,
    pub storage_backend: StorageBackend,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, every token will be rejected");
                    String::new()
                }),
            token_ttl_hours: parse_in_range(
                "TOKEN_TTL_HOURS",
                DEFAULT_TOKEN_TTL_HOURS,
                1,
                MAX_TOKEN_TTL_HOURS,
            ),
            otp_ttl_minutes: parse_in_range(
                "OTP_TTL_MINUTES",
                DEFAULT_OTP_TTL_MINUTES,
                1,
                MAX_OTP_TTL_MINUTES,
            ),
            storage_backend: match env::var("STORAGE_BACKEND").as_deref() {
                Ok("supabase") => StorageBackend::Supabase,
                Ok("memory") | Err(_) => StorageBackend::Memory,
                Ok(other) => {
                    warn!("Unknown STORAGE_BACKEND '{}', using in-memory storage", other);
                    StorageBackend::Memory
                }
            },
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| String::new()),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| String::new()),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            max_upload_bytes: parse_in_range(
                "MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
                1,
                MAX_UPLOAD_BYTES_LIMIT,
            ),
            port: parse_or("PORT", DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let storage_ready = match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => self.is_supabase_configured(),
        };

        !self.jwt_secret.is_empty() && storage_ready
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Like `parse_or`, but values outside `min..=max` also fall back to `default`.
fn parse_in_range<T>(key: &str, default: T, min: T, max: T) -> T
where
    T: FromStr + Copy + PartialOrd + std::fmt::Display,
{
    check_range(key, parse_or(key, default), default, min, max)
}

fn check_range<T>(key: &str, value: T, default: T, min: T, max: T) -> T
where
    T: Copy + PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        warn!("{} must be between {} and {}, using default {}", key, min, max, default);
        return default;
    }
    value
}
