// Payload Codec Port
// Turns a queued item into an opaque byte form for storage and back

use crate::domain::QueuedItem;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Serialization collaborator injected into persistent drivers
///
/// Implementations must round-trip payload content exactly.
pub trait PayloadCodec: Send + Sync {
    fn encode(&self, item: &QueuedItem) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<QueuedItem, CodecError>;
}

/// JSON codec (serde_json)
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode(&self, item: &QueuedItem) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(item).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<QueuedItem, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
