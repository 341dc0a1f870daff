// Worker - claim, dispatch, release loop

pub mod constants;
mod dispatcher;
mod events;
mod shutdown;

use constants::*;
pub use dispatcher::{
    handler_fn, Dispatch, FnHandler, HandlerError, PayloadDispatcher, PayloadHandler,
};
pub use events::WorkerListener;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::domain::{ItemId, QueuedItem};
use crate::error::Result;
use crate::port::QueueDriver;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue (or aggregate channel) to pop from; `None` lets the driver pick
    pub queue: Option<String>,
    pub idle_sleep: Duration,
    pub error_sleep: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: None,
            idle_sleep: IDLE_SLEEP_DURATION,
            error_sleep: ERROR_RECOVERY_SLEEP_DURATION,
        }
    }
}

/// Result of one `process_next` pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Nothing to claim
    Idle,
    /// Handler succeeded, item released
    Completed(ItemId),
    /// Payload was not executable, item released
    Skipped(ItemId),
    /// Handler failed, item left claimed
    Failed(ItemId),
}

/// Pops items from a driver and runs their handlers
///
/// Success releases the item. A failing handler leaves it claimed: whether and
/// how it is retried is up to the operator.
pub struct Worker {
    driver: Arc<dyn QueueDriver>,
    dispatcher: Arc<PayloadDispatcher>,
    listeners: Vec<Arc<dyn WorkerListener>>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        driver: Arc<dyn QueueDriver>,
        dispatcher: Arc<PayloadDispatcher>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            driver,
            dispatcher,
            listeners: Vec::new(),
            config,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn WorkerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn queue_label(&self) -> &str {
        self.config.queue.as_deref().unwrap_or("*")
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(queue = %self.queue_label(), "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(queue = %self.queue_label(), "Worker shutting down");
                break;
            }

            let pause = match self.process_next().await {
                Ok(ProcessOutcome::Idle) => Some(self.config.idle_sleep),
                Ok(_) => None,
                Err(e) => {
                    error!(error = %e, "Worker error");
                    Some(self.config.error_sleep)
                }
            };

            if let Some(duration) = pause {
                tokio::select! {
                    _ = sleep(duration) => {},
                    _ = shutdown.wait() => {
                        info!("Worker interrupted while sleeping");
                        break;
                    }
                }
            }
        }
        info!(queue = %self.queue_label(), "Worker stopped");
        Ok(())
    }

    /// Claim and process a single item
    pub async fn process_next(&self) -> Result<ProcessOutcome> {
        let item = match self.driver.pop(self.config.queue.as_deref()).await? {
            Some(item) => item,
            None => return Ok(ProcessOutcome::Idle),
        };

        debug!(
            item_id = %item.id(),
            queue = %item.queue(),
            event = EVENT_PAYLOAD_RECEIVED,
            "Payload received"
        );
        for listener in &self.listeners {
            listener.on_payload_received(&item);
        }

        match self.execute(&item).await {
            Ok(dispatch) => {
                self.driver.release_item(&item).await?;
                match dispatch {
                    Dispatch::Executed => {
                        info!(item_id = %item.id(), "Item completed");
                        Ok(ProcessOutcome::Completed(item.id().to_string()))
                    }
                    Dispatch::Skipped => {
                        warn!(item_id = %item.id(), "Payload not executable, released");
                        Ok(ProcessOutcome::Skipped(item.id().to_string()))
                    }
                }
            }
            Err(e) => {
                warn!(
                    item_id = %item.id(),
                    queue = %item.queue(),
                    event = EVENT_PAYLOAD_FAILURE,
                    error = %e,
                    "Payload failed, leaving it claimed"
                );
                for listener in &self.listeners {
                    listener.on_payload_failure(&item, &e);
                }
                Ok(ProcessOutcome::Failed(item.id().to_string()))
            }
        }
    }

    // Handlers run on their own task so a panic cannot take the worker down
    async fn execute(&self, item: &QueuedItem) -> std::result::Result<Dispatch, HandlerError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let claimed = item.clone();

        let handle = tokio::task::spawn(async move { dispatcher.dispatch(&claimed).await });

        match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                error!(item_id = %item.id(), "Handler panicked");
                Err(HandlerError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(HandlerError::Failed(join_err.to_string())),
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
