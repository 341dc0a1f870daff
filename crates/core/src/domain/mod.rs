// Domain Layer - Queued items and queue naming

pub mod item;
pub mod queue;

// Re-exports
pub use item::{ExecutablePayload, InvalidArgs, ItemId, Payload, PushInput, QueuedItem};
pub use queue::{normalize_queue_name, resolve_queue_name, QueueName, DEFAULT_QUEUE};
