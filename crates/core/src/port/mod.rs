// Port Layer - Interfaces for storage backends and collaborators

pub mod codec;
pub mod id_provider; // For deterministic testing
pub mod queue_driver;
pub mod time_provider;

// Re-exports
pub use codec::{CodecError, JsonCodec, PayloadCodec};
pub use id_provider::IdProvider;
pub use queue_driver::QueueDriver;
pub use time_provider::TimeProvider;
