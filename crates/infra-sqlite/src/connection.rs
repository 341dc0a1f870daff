// SQLite Connection Pool Setup

use qmux_core::error::QueueError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Pool settings (instance-scoped, no global state)
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Create SQLite connection pool with WAL mode
///
/// In-memory databases are private to their connection, so they are pinned to
/// a single one.
pub async fn create_pool(
    database_url: &str,
    config: &PoolConfig,
) -> Result<SqlitePool, QueueError> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| QueueError::Configuration(format!("Invalid database url: {}", e)))?
        .busy_timeout(config.busy_timeout)
        .create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let max_connections = if in_memory { 1 } else { config.max_connections };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| QueueError::read("connect", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool() {
        let pool = create_pool("sqlite::memory:", &PoolConfig::default())
            .await
            .unwrap();
        assert!(pool.acquire().await.is_ok());
    }
}
