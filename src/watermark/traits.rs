//! Watermark store trait definition

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::models::Watermark;

/// Persists the single "last successful sync" timestamp
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Read the stored watermark
    ///
    /// Never fails: missing, unreadable or corrupt storage reads as `None`,
    /// which the engine treats as a first run.
    async fn load(&self) -> Option<Watermark>;

    /// Overwrite the stored watermark
    async fn save(&self, watermark: Option<Watermark>) -> Result<(), PersistenceError>;
}
