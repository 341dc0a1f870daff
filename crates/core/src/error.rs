// Central Error Type for queue drivers and the aggregate

use crate::port::codec::CodecError;
use thiserror::Error;

/// Boxed store-layer cause carried by read/write failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Queue error taxonomy
///
/// Store failures are always surfaced as `Read` or `Write` so callers can branch
/// on the failure class without depending on a concrete backend.
#[derive(Error, Debug)]
pub enum QueueError {
    /// A read-type operation (pop, find_by_id, size, list_queues) failed in the store
    #[error("Read error during {operation}: {source}")]
    Read {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// A write-type operation (push, release, claim update) failed in the store
    #[error("Write error during {operation}: {source}")]
    Write {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl QueueError {
    pub fn read(operation: &'static str, err: impl Into<BoxError>) -> Self {
        QueueError::Read {
            operation,
            source: err.into(),
        }
    }

    pub fn write(operation: &'static str, err: impl Into<BoxError>) -> Self {
        QueueError::Write {
            operation,
            source: err.into(),
        }
    }

    /// True for store-layer I/O failures (as opposed to lookup/config errors)
    pub fn is_io(&self) -> bool {
        matches!(self, QueueError::Read { .. } | QueueError::Write { .. })
    }
}

/// Result type alias using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;
