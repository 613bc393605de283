//! File-backed watermark store
//!
//! The watermark lives in a JSON document `{"lastSyncDate": <string|null>}`.
//! Writes go to a sibling temp file that is flushed to disk and then renamed
//! over the original, so a crash mid-write leaves the previous value intact.
//!
//! A run holds an exclusive advisory lock on `<path>.lock` for its whole
//! duration; a second run against the same file fails fast instead of racing
//! on the watermark.

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::models::Watermark;

use super::WatermarkStore;

/// On-disk document layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct WatermarkFile {
    #[serde(rename = "lastSyncDate", default)]
    last_sync_date: Option<Watermark>,
}

/// Watermark store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    /// Create a store for the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the watermark file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the run-lease lock file
    pub fn lease_path(&self) -> PathBuf {
        with_suffix(&self.path, ".lock")
    }

    /// Acquire the run lease without blocking
    ///
    /// The lease is released when the returned guard is dropped.
    pub fn try_lease(&self) -> Result<RunLease, PersistenceError> {
        let path = self.lease_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(PersistenceError::Locked(path.display().to_string()));
        }

        debug!(path = %path.display(), "Acquired run lease");
        Ok(RunLease { file, path })
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> Option<Watermark> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No watermark file, starting from scratch");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read watermark file, starting from scratch");
                return None;
            }
        };

        match serde_json::from_slice::<WatermarkFile>(&bytes) {
            Ok(file) => file
                .last_sync_date
                .filter(|watermark| !watermark.as_str().trim().is_empty()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt watermark file, starting from scratch");
                None
            }
        }
    }

    async fn save(&self, watermark: Option<Watermark>) -> Result<(), PersistenceError> {
        let document = WatermarkFile {
            last_sync_date: watermark,
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = with_suffix(&self.path, ".tmp");
        write_synced(&tmp_path, &json).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!(
            path = %self.path.display(),
            watermark = document.last_sync_date.as_ref().map(Watermark::as_str),
            "Saved watermark"
        );
        Ok(())
    }
}

/// Write `contents` to `path` and wait until it reached the disk
async fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

/// Exclusive lease on a watermark file, held for one run
#[derive(Debug)]
pub struct RunLease {
    file: File,
    path: PathBuf,
}

impl RunLease {
    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "Failed to release run lease");
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileWatermarkStore {
        FileWatermarkStore::new(dir.path().join("last_sync_date.json"))
    }

    // Test 1: Missing file loads as absent
    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        assert_eq!(store.load().await, None);
    }

    // Test 2: Save then load returns the same value
    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        store
            .save(Some(Watermark::new("2024-03-01T10:00:00Z")))
            .await
            .unwrap();

        assert_eq!(
            store.load().await,
            Some(Watermark::new("2024-03-01T10:00:00Z"))
        );
    }

    // Test 3: File layout is {"lastSyncDate": ...}
    #[tokio::test]
    async fn test_file_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        store
            .save(Some(Watermark::new("2024-03-01T10:00:00Z")))
            .await
            .unwrap();
        let content: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(
            content,
            serde_json::json!({"lastSyncDate": "2024-03-01T10:00:00Z"})
        );

        store.save(None).await.unwrap();
        let content: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(content, serde_json::json!({"lastSyncDate": null}));

        // No temp file left behind
        assert!(!with_suffix(store.path(), ".tmp").exists());
    }

    // Test 4: Corrupt, null and empty values load as absent
    #[tokio::test]
    async fn test_load_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        std::fs::write(store.path(), b"{not json").unwrap();
        assert_eq!(store.load().await, None);

        std::fs::write(store.path(), br#"{"lastSyncDate": null}"#).unwrap();
        assert_eq!(store.load().await, None);

        std::fs::write(store.path(), br#"{"lastSyncDate": ""}"#).unwrap();
        assert_eq!(store.load().await, None);

        std::fs::write(store.path(), br#"{"lastSyncDate": 12}"#).unwrap();
        assert_eq!(store.load().await, None);
    }

    // Test 5: Save creates missing parent directories
    #[tokio::test]
    async fn test_save_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileWatermarkStore::new(temp_dir.path().join("state/nested/watermark.json"));

        store
            .save(Some(Watermark::new("2024-01-01T00:00:00Z")))
            .await
            .unwrap();

        assert!(store.path().exists());
    }

    // Test 6: Save failure is surfaced
    #[tokio::test]
    async fn test_save_failure_is_surfaced() {
        let temp_dir = TempDir::new().unwrap();
        // The watermark path is an existing directory, so the rename fails
        let path = temp_dir.path().join("occupied");
        std::fs::create_dir_all(path.join("child")).unwrap();
        let store = FileWatermarkStore::new(path);

        let result = store.save(Some(Watermark::new("2024-01-01T00:00:00Z"))).await;

        assert!(matches!(result, Err(PersistenceError::Io(_))));
    }

    // Test 7: A stale temp file from an interrupted save is replaced
    #[tokio::test]
    async fn test_save_replaces_stale_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let tmp_path = with_suffix(store.path(), ".tmp");
        std::fs::write(&tmp_path, vec![b'x'; 4096]).unwrap();

        store
            .save(Some(Watermark::new("2024-06-01T00:00:00Z")))
            .await
            .unwrap();

        assert!(!tmp_path.exists());
        assert_eq!(
            store.load().await,
            Some(Watermark::new("2024-06-01T00:00:00Z"))
        );
    }

    // Test 8: Second lease on the same file fails until the first is dropped
    #[test]
    fn test_run_lease_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let other = store_in(&temp_dir);

        let lease = store.try_lease().unwrap();
        assert!(lease.path().ends_with("last_sync_date.json.lock"));

        let result = other.try_lease();
        assert!(matches!(result, Err(PersistenceError::Locked(_))));

        drop(lease);
        assert!(other.try_lease().is_ok());
    }
}
