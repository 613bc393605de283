//! Destination client trait definition

use async_trait::async_trait;

use crate::error::RequestError;
use crate::models::{CustomerPayload, DestinationRecord};

/// Record-level operations against the destination system
///
/// Every operation is a single unit of work. Implementations handle
/// transient rate limiting themselves; any error returned is final for that
/// operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Find destination records by customer name
    ///
    /// An empty result means the customer does not exist yet.
    async fn find_by_name(&self, name: &str) -> Result<Vec<DestinationRecord>, RequestError>;

    /// Create a new record; the destination assigns its id
    ///
    /// The returned record has no id when the destination acknowledged the
    /// write without echoing it.
    async fn create(&self, payload: &CustomerPayload) -> Result<DestinationRecord, RequestError>;

    /// Update the record identified by `payload.id`
    async fn update(&self, payload: &CustomerPayload) -> Result<DestinationRecord, RequestError>;

    /// Delete a record
    ///
    /// Part of the destination contract; the sync engine never deletes.
    async fn delete(&self, record: &DestinationRecord) -> Result<DestinationRecord, RequestError>;
}
