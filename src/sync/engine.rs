//! Reconciliation engine
//!
//! One run goes through these phases:
//!
//! 1. load the watermark
//! 2. extract every source record changed since the watermark
//! 3. split the records into groups of `max_concurrent` and reconcile each
//!    group concurrently, one group after another
//! 4. advance the watermark to the newest `updatedAt` seen
//! 5. persist the watermark and report statistics
//!
//! A failed extraction ends the run before any destination write and leaves
//! the watermark untouched. Record-level failures are logged, counted and
//! skipped.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::destination::DestinationClient;
use crate::error::{RequestError, SyncError};
use crate::models::watermark::advance;
use crate::models::{CustomerPayload, ReconcileOutcome, RunStatistics, SourceRecord, Watermark};
use crate::source::SourceReader;
use crate::watermark::WatermarkStore;

/// Result of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Counters for the run
    pub statistics: RunStatistics,
    /// Watermark loaded at run start
    pub previous_watermark: Option<Watermark>,
    /// Watermark persisted at run end
    pub watermark: Option<Watermark>,
}

impl RunReport {
    /// Whether this run moved the watermark forward
    pub fn advanced(&self) -> bool {
        self.watermark != self.previous_watermark
    }
}

/// Drives one incremental sync run from the source into the destination
pub struct ReconciliationEngine {
    source: Arc<dyn SourceReader>,
    destination: Arc<dyn DestinationClient>,
    watermark_store: Arc<dyn WatermarkStore>,
    max_concurrent: usize,
}

impl ReconciliationEngine {
    /// Create an engine; `max_concurrent` is the group size
    pub fn new(
        source: Arc<dyn SourceReader>,
        destination: Arc<dyn DestinationClient>,
        watermark_store: Arc<dyn WatermarkStore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            source,
            destination,
            watermark_store,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Group size used for dispatch
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run one sync pass, abandoning it if it outlives `deadline`
    ///
    /// An abandoned run does not persist the watermark.
    pub async fn run_with_deadline(
        &self,
        deadline: Option<Duration>,
    ) -> Result<RunReport, SyncError> {
        let Some(deadline) = deadline else {
            return self.run().await;
        };

        match tokio::time::timeout(deadline, self.run()).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    timeout_secs = deadline.as_secs(),
                    "Sync run timed out, watermark not advanced"
                );
                Err(SyncError::Timeout(deadline.as_secs()))
            }
        }
    }

    /// Run one sync pass
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let previous_watermark = self.watermark_store.load().await;
        info!(
            watermark = previous_watermark.as_ref().map(Watermark::as_str),
            max_concurrent = self.max_concurrent,
            "Starting customer sync"
        );

        let records = match self.source.fetch_changed(previous_watermark.clone()).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Extraction failed, watermark not advanced");
                return Err(e.into());
            }
        };

        let mut statistics = RunStatistics {
            records_fetched: records.len() as u64,
            ..Default::default()
        };

        for (index, group) in records.chunks(self.max_concurrent).enumerate() {
            if index == 0 {
                statistics.chunks_processed = group.len() as u64;
            }

            let outcomes = join_all(group.iter().map(|record| self.reconcile(record))).await;
            statistics.extend(outcomes);
            statistics.groups_processed += 1;

            debug!(group = index + 1, size = group.len(), "Group reconciled");
        }

        let watermark = advance(previous_watermark.as_ref(), &records);

        info!(
            records_fetched = statistics.records_fetched,
            updated = statistics.updated,
            created = statistics.created,
            errors = statistics.errors,
            chunks_processed = statistics.chunks_processed,
            groups_processed = statistics.groups_processed,
            "Sync statistics"
        );

        if let Err(source) = self.watermark_store.save(watermark.clone()).await {
            error!(error = %source, "Failed to persist watermark");
            return Err(SyncError::Persistence { source, statistics });
        }

        info!(
            watermark = watermark.as_ref().map(Watermark::as_str),
            "Customer sync completed"
        );

        Ok(RunReport {
            statistics,
            previous_watermark,
            watermark,
        })
    }

    /// Create or update the destination counterpart of one source record
    ///
    /// Never fails: errors are logged and reported as
    /// [`ReconcileOutcome::Failed`].
    pub async fn reconcile(&self, record: &SourceRecord) -> ReconcileOutcome {
        match self.try_reconcile(record).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(customer = %record.name, error = %e, "Failed to reconcile customer");
                ReconcileOutcome::Failed
            }
        }
    }

    async fn try_reconcile(&self, record: &SourceRecord) -> Result<ReconcileOutcome, RequestError> {
        let matches = self.destination.find_by_name(&record.name).await?;
        let payload = CustomerPayload::from(record);

        match matches.into_iter().next() {
            Some(existing) => {
                let id = existing.id.ok_or_else(|| {
                    RequestError::InvalidData(format!(
                        "Destination record for customer {} has no id",
                        record.name
                    ))
                })?;
                self.destination.update(&payload.with_id(id)).await?;
                Ok(ReconcileOutcome::Updated)
            }
            None => {
                self.destination.create(&payload).await?;
                Ok(ReconcileOutcome::Created)
            }
        }
    }
}
