use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::ReportError;

/// Where uploaded report bytes live. Keys are built from server-side ids only,
/// so client file names never reach the file system.
#[async_trait]
pub trait ReportFileStore: Send + Sync {
    /// Stores `bytes` and returns the key to record with the report.
    async fn save(
        &self,
        appointment_id: Uuid,
        report_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String, ReportError>;

    async fn remove(&self, key: &str) -> Result<(), ReportError>;
}

/// `<root>/<appointmentId>/<reportId>.<ext>` on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ReportFileStore for LocalFileStore {
    async fn save(
        &self,
        appointment_id: Uuid,
        report_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String, ReportError> {
        let key = format!("{}/{}.{}", appointment_id, report_id, extension);
        let directory = self.root.join(appointment_id.to_string());
        let target = self.path_for(&key);
        let partial = directory.join(format!("{}.part", report_id));

        fs::create_dir_all(&directory)
            .await
            .map_err(|e| ReportError::Storage(format!("create {}: {}", directory.display(), e)))?;

        // Readers only ever see complete files.
        fs::write(&partial, bytes)
            .await
            .map_err(|e| ReportError::Storage(format!("write {}: {}", partial.display(), e)))?;
        fs::rename(&partial, &target)
            .await
            .map_err(|e| ReportError::Storage(format!("rename to {}: {}", target.display(), e)))?;

        debug!("Stored {} bytes at {}", bytes.len(), target.display());
        Ok(key)
    }

    async fn remove(&self, key: &str) -> Result<(), ReportError> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored report {} was already gone", path.display());
                Ok(())
            }
            Err(e) => Err(ReportError::Storage(format!("remove {}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_lays_files_out_by_appointment() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let appointment_id = Uuid::new_v4();
        let report_id = Uuid::new_v4();

        let key = store.save(appointment_id, report_id, "pdf", b"%PDF-1.7").await.unwrap();

        assert_eq!(key, format!("{}/{}.pdf", appointment_id, report_id));
        let written = tokio::fs::read(dir.path().join(&key)).await.unwrap();
        assert_eq!(written, b"%PDF-1.7");
        assert!(!dir
            .path()
            .join(appointment_id.to_string())
            .join(format!("{}.part", report_id))
            .exists());
    }

    #[tokio::test]
    async fn remove_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        let key = store.save(Uuid::new_v4(), Uuid::new_v4(), "png", b"png").await.unwrap();
        store.remove(&key).await.unwrap();
        assert!(!store.path_for(&key).exists());

        store.remove(&key).await.unwrap();
    }
}
