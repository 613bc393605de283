//! Run statistics
//!
//! Each record reconciliation yields a [`ReconcileOutcome`]; the engine folds
//! the outcomes of a run into a single [`RunStatistics`] value.

use serde::Serialize;

/// Result of reconciling one source record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// A new destination record was created
    Created,
    /// An existing destination record was updated
    Updated,
    /// Lookup or write failed; the record was skipped
    Failed,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Records returned by the source
    pub records_fetched: u64,
    /// Destination records updated
    pub updated: u64,
    /// Destination records created
    pub created: u64,
    /// Records that failed to reconcile
    pub errors: u64,
    /// Size of the first group (legacy counter, kept for log compatibility)
    pub chunks_processed: u64,
    /// Number of groups dispatched
    pub groups_processed: u64,
}

impl RunStatistics {
    /// Tally one reconciliation outcome
    pub fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created => self.created += 1,
            ReconcileOutcome::Updated => self.updated += 1,
            ReconcileOutcome::Failed => self.errors += 1,
        }
    }

    /// Records written to the destination
    pub fn reconciled(&self) -> u64 {
        self.created + self.updated
    }
}

impl Extend<ReconcileOutcome> for RunStatistics {
    fn extend<I: IntoIterator<Item = ReconcileOutcome>>(&mut self, outcomes: I) {
        for outcome in outcomes {
            self.record(outcome);
        }
    }
}
