// Application Layer - Aggregate multiplexer and worker

pub mod aggregate;
pub mod worker;

// Re-exports
pub use aggregate::{AggregateQueue, WeightedSampler, DEFAULT_CHANNEL_WEIGHT};
pub use worker::{
    handler_fn, shutdown_channel, HandlerError, PayloadDispatcher, PayloadHandler,
    ProcessOutcome, ShutdownSender, ShutdownToken, Worker, WorkerConfig, WorkerListener,
};
