// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no items are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a queue error before polling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Fired right before a claimed payload is handed to its handler
pub const EVENT_PAYLOAD_RECEIVED: &str = "worker.payload.received";

/// Fired when a handler fails; the item stays claimed
pub const EVENT_PAYLOAD_FAILURE: &str = "worker.after.exec";
