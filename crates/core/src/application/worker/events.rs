// Worker events

use super::dispatcher::HandlerError;
use crate::domain::QueuedItem;

/// Observer of worker events
///
/// Both hooks default to no-ops so listeners only implement what they need.
pub trait WorkerListener: Send + Sync {
    /// `worker.payload.received`: the item was claimed and is about to run
    fn on_payload_received(&self, _item: &QueuedItem) {}

    /// `worker.after.exec`: the handler failed and the item stays claimed
    fn on_payload_failure(&self, _item: &QueuedItem, _error: &HandlerError) {}
}
