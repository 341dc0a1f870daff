// Queue Driver Port (Interface)

use crate::domain::{PushInput, QueueName, QueuedItem};
use crate::error::Result;
use async_trait::async_trait;

/// Contract every queue backend (and the aggregate itself) implements
///
/// Queue names are normalized by lower-casing; `None` resolves to the driver's
/// default queue. All operations may be called concurrently.
#[async_trait]
pub trait QueueDriver: Send + Sync {
    /// Store a payload (or re-store a queued item, keeping its id and creation time)
    ///
    /// Returns `Ok(None)` when the backend declines the item (e.g. it is full).
    ///
    /// # Errors
    /// - `QueueError::Write` if the store rejects the write
    async fn push(&self, input: PushInput, queue: Option<&str>) -> Result<Option<QueuedItem>>;

    /// Atomically claim one unclaimed item; claimed items stay stored until released
    ///
    /// # Errors
    /// - `QueueError::Read` on store failure
    async fn pop(&self, queue: Option<&str>) -> Result<Option<QueuedItem>>;

    /// Permanently delete an item; deleting a missing id is a no-op
    ///
    /// # Errors
    /// - `QueueError::Write` on store failure
    async fn release(&self, id: &str, queue: Option<&str>) -> Result<()>;

    /// Release an item within the queue it belongs to
    async fn release_item(&self, item: &QueuedItem) -> Result<()> {
        self.release(item.id(), Some(item.queue())).await
    }

    /// Look up an item by id regardless of its claim state
    async fn find_by_id(&self, id: &str, queue: Option<&str>) -> Result<Option<QueuedItem>>;

    /// Count every stored item of the queue, claimed or not
    async fn size(&self, queue: Option<&str>) -> Result<u64>;

    /// Distinct queue names known to the backend
    async fn list_queues(&self) -> Result<Vec<QueueName>>;
}
