// Payload Dispatcher - maps executable payloads to registered handlers

use crate::domain::{ExecutablePayload, QueuedItem};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    #[error("Invalid executable payload: {0}")]
    InvalidPayload(String),

    #[error("No handler registered for function: {0}")]
    UnknownFunction(String),

    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

/// A function an executable payload can reference by name
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    /// Called with the payload's `args`, or with no arguments when absent
    async fn call(&self, args: Vec<Value>) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into a `PayloadHandler`
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> PayloadHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn call(&self, args: Vec<Value>) -> Result<(), HandlerError> {
        (self.0)(args).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    FnHandler(f)
}

/// What the dispatcher did with an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Executed,
    /// Payload is not `{fun, args?}`: nothing to run
    Skipped,
}

#[derive(Default)]
pub struct PayloadDispatcher {
    handlers: HashMap<String, Arc<dyn PayloadHandler>>,
}

impl PayloadDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `fun`
    pub fn register<H>(&mut self, fun: impl Into<String>, handler: H) -> &mut Self
    where
        H: PayloadHandler + 'static,
    {
        self.handlers.insert(fun.into(), Arc::new(handler));
        self
    }

    pub fn has_handler(&self, fun: &str) -> bool {
        self.handlers.contains_key(fun)
    }

    /// Run the handler referenced by the item's payload
    ///
    /// Handler errors are returned untouched; the caller decides whether the
    /// item is released or left claimed.
    pub async fn dispatch(&self, item: &QueuedItem) -> Result<Dispatch, HandlerError> {
        let ExecutablePayload { fun, args, .. } = match item.payload().as_executable() {
            None => return Ok(Dispatch::Skipped),
            Some(parsed) => parsed.map_err(|e| HandlerError::InvalidPayload(e.to_string()))?,
        };

        let handler = self
            .handlers
            .get(&fun)
            .ok_or_else(|| HandlerError::UnknownFunction(fun.clone()))?;

        handler.call(args).await?;
        Ok(Dispatch::Executed)
    }
}
