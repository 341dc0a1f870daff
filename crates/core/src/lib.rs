// qmux Core - Domain, Ports, Aggregate Multiplexer & Worker
// NO infrastructure dependencies: storage adapters live in their own crates

pub mod application;
pub mod domain;
pub mod error;
pub mod memory;
pub mod port;

pub use application::{AggregateQueue, Worker};
pub use domain::{ItemId, Payload, PushInput, QueueName, QueuedItem, DEFAULT_QUEUE};
pub use error::{QueueError, Result};
pub use memory::MemoryQueueDriver;
pub use port::QueueDriver;
