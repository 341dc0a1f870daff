// Queue naming

/// Queue (or channel) identifier, always stored normalized
pub type QueueName = String;

/// Queue used when a caller does not name one
pub const DEFAULT_QUEUE: &str = "general";

/// Normalize a queue name (queue names are case-insensitive)
pub fn normalize_queue_name(name: &str) -> QueueName {
    name.to_lowercase()
}

/// Normalize `name`, falling back to `default` when absent
pub fn resolve_queue_name(name: Option<&str>, default: &str) -> QueueName {
    normalize_queue_name(name.unwrap_or(default))
}
