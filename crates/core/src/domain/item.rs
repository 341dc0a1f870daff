// Queued Item Domain Model

use super::queue::{normalize_queue_name, QueueName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Item ID (assigned by the backend, UUID v4 by default)
pub type ItemId = String;

/// Application payload (JSON serializable, opaque to the queue)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(serde_json::Value);

impl Payload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    /// Interpret the payload as `{ver?, fun, args?}`
    ///
    /// `None` when there is no string `fun`. Missing or null `args` mean no
    /// arguments and `ver` is kept whatever its JSON type. Any other
    /// non-array `args` makes the payload executable but not callable.
    pub fn as_executable(&self) -> Option<Result<ExecutablePayload, InvalidArgs>> {
        let object = self.0.as_object()?;
        let fun = object.get("fun")?.as_str()?.to_string();

        let ver = object.get("ver").and_then(|ver| match ver {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        let args = match object.get("args") {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(serde_json::Value::Array(args)) => Ok(args.clone()),
            Some(other) => Err(InvalidArgs(other.to_string())),
        };

        Some(args.map(|args| ExecutablePayload { ver, fun, args }))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// `args` of an executable payload that is neither an array nor null
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Payload args must be an array, got {0}")]
pub struct InvalidArgs(pub String);

/// Payload shape understood by the worker dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutablePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
    pub fun: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,
}

impl ExecutablePayload {
    pub fn new(fun: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        Self {
            ver: None,
            fun: fun.into(),
            args,
        }
    }

    pub fn into_payload(self) -> Payload {
        // Serializing a struct of strings and JSON values cannot fail
        Payload(serde_json::to_value(self).unwrap_or(serde_json::Value::Null))
    }
}

/// A payload plus its queue metadata
///
/// Fields are read-only once created: only a driver's claim flips `claimed`,
/// and the payload is never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedItem {
    id: ItemId,
    queue: QueueName,
    payload: Payload,
    created_at: i64, // epoch seconds
    #[serde(default)]
    claimed: bool,
}

impl QueuedItem {
    /// Create a fresh, unclaimed item
    pub fn new(
        id: impl Into<ItemId>,
        queue: &str,
        payload: Payload,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            queue: normalize_queue_name(queue),
            payload,
            created_at,
            claimed: false,
        }
    }

    /// Rebuild an item from its stored record
    pub fn restore(
        id: impl Into<ItemId>,
        queue: &str,
        payload: Payload,
        created_at: i64,
        claimed: bool,
    ) -> Self {
        Self {
            claimed,
            ..Self::new(id, queue, payload, created_at)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Same item bound to another queue (id and creation time preserved)
    pub fn with_queue(mut self, queue: &str) -> Self {
        self.queue = normalize_queue_name(queue);
        self
    }

    /// Copy handed out by a successful claim
    pub fn into_claimed(mut self) -> Self {
        self.claimed = true;
        self
    }

    /// Copy stored by a push: re-pushing never carries a claim over
    pub fn into_unclaimed(mut self) -> Self {
        self.claimed = false;
        self
    }
}

/// What a producer hands to `push`
#[derive(Debug, Clone)]
pub enum PushInput {
    /// New payload: the driver mints id and timestamp
    Payload(Payload),
    /// Already queued item: id and creation time are preserved
    Queued(QueuedItem),
}

impl PushInput {
    /// Queue the item was bound to, if the input is already a queued item
    pub fn queue_hint(&self) -> Option<&str> {
        match self {
            PushInput::Payload(_) => None,
            PushInput::Queued(item) => Some(item.queue()),
        }
    }
}

impl From<Payload> for PushInput {
    fn from(payload: Payload) -> Self {
        PushInput::Payload(payload)
    }
}

impl From<serde_json::Value> for PushInput {
    fn from(value: serde_json::Value) -> Self {
        PushInput::Payload(Payload::new(value))
    }
}

impl From<QueuedItem> for PushInput {
    fn from(item: QueuedItem) -> Self {
        PushInput::Queued(item)
    }
}

impl From<ExecutablePayload> for PushInput {
    fn from(payload: ExecutablePayload) -> Self {
        PushInput::Payload(payload.into_payload())
    }
}
