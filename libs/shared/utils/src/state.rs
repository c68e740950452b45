use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StorageBackend};
use shared_database::{
    AppointmentRepository, InMemoryStore, ReportRepository, SupabaseStore, UserRepository,
    VerificationRepository,
};

use crate::jwt::TokenCodec;

/// Everything a cell router needs: configuration, the token codec built from
/// it, and the storage collaborators.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub codec: Arc<TokenCodec>,
    pub users: Arc<dyn UserRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub reports: Arc<dyn ReportRepository>,
    pub verifications: Arc<dyn VerificationRepository>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Self {
        match config.storage_backend {
            StorageBackend::Memory => Self::in_memory(config),
            StorageBackend::Supabase => {
                info!("Using Supabase storage at {}", config.supabase_url);
                let store = Arc::new(SupabaseStore::new(&config));
                Self::with_store(config, store)
            }
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        info!("Using in-memory storage");
        Self::with_store(config, Arc::new(InMemoryStore::new()))
    }

    pub fn with_store<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: UserRepository
            + AppointmentRepository
            + ReportRepository
            + VerificationRepository
            + 'static,
    {
        Self {
            codec: Arc::new(TokenCodec::from_config(&config)),
            config: Arc::new(config),
            users: store.clone(),
            appointments: store.clone(),
            reports: store.clone(),
            verifications: store,
        }
    }
}
