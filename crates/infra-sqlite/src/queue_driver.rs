// SQLite QueueDriver Implementation

use async_trait::async_trait;
use qmux_core::domain::{
    normalize_queue_name, resolve_queue_name, PushInput, QueueName, QueuedItem, DEFAULT_QUEUE,
};
use qmux_core::error::{QueueError, Result};
use qmux_core::port::id_provider::UuidProvider;
use qmux_core::port::time_provider::SystemTimeProvider;
use qmux_core::port::{CodecError, IdProvider, JsonCodec, PayloadCodec, QueueDriver, TimeProvider};
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Store failure with the SQLite result code spelled out
#[derive(Debug)]
struct StoreError {
    detail: String,
    source: sqlx::Error,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

// Helper to convert sqlx::Error into a store error with structured information
fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    let detail = match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            Some(code) => match code.as_ref() {
                "2067" | "1555" => format!(
                    "Unique constraint violation: {} ({})",
                    db_err.message(),
                    code
                ),
                "5" => format!("Database locked (SQLITE_BUSY): {}", db_err.message()),
                "13" => format!("Database full: {}", db_err.message()),
                other => format!("Database error [{}]: {}", other, db_err.message()),
            },
            None => format!("Database error: {}", db_err.message()),
        },
        sqlx::Error::PoolTimedOut => "Connection pool timed out".to_string(),
        other => other.to_string(),
    };
    StoreError {
        detail,
        source: err,
    }
}

fn read_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> QueueError {
    move |err| QueueError::read(operation, classify_sqlx_error(err))
}

fn write_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> QueueError {
    move |err| QueueError::write(operation, classify_sqlx_error(err))
}

/// Which unclaimed item a pop claims
///
/// `Lifo` (default) hands out the most recently pushed item: bursty producers
/// see low latency, but older items can wait while new ones keep arriving.
/// `Fifo` claims the oldest item first for strict arrival-order fairness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimOrder {
    #[default]
    Lifo,
    Fifo,
}

impl ClaimOrder {
    fn direction(self) -> &'static str {
        match self {
            ClaimOrder::Lifo => "DESC",
            ClaimOrder::Fifo => "ASC",
        }
    }
}

impl FromStr for ClaimOrder {
    type Err = QueueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lifo" => Ok(ClaimOrder::Lifo),
            "fifo" => Ok(ClaimOrder::Fifo),
            other => Err(QueueError::Configuration(format!(
                "Unknown claim order: {} (expected lifo or fifo)",
                other
            ))),
        }
    }
}

/// Per-driver settings
#[derive(Debug, Clone)]
pub struct SqliteDriverConfig {
    pub default_queue: QueueName,
    pub claim_order: ClaimOrder,
}

impl Default for SqliteDriverConfig {
    fn default() -> Self {
        Self {
            default_queue: DEFAULT_QUEUE.to_string(),
            claim_order: ClaimOrder::default(),
        }
    }
}

/// Persistent driver on a shared SQLite table
///
/// Claim exclusivity comes from a single conditional `UPDATE .. RETURNING`
/// statement; the driver holds no in-process lock. Any number of driver
/// instances may point at the same database file.
pub struct SqliteQueueDriver {
    pool: SqlitePool,
    default_queue: QueueName,
    pop_sql: String,
    codec: Arc<dyn PayloadCodec>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteQueueDriver {
    pub fn new(pool: SqlitePool, config: SqliteDriverConfig) -> Self {
        let pop_sql = format!(
            r#"
            UPDATE queue_items
            SET claimed = 1
            WHERE seq = (
                SELECT seq FROM queue_items
                WHERE queue = ? AND claimed = 0
                ORDER BY seq {}
                LIMIT 1
            )
              AND claimed = 0
            RETURNING id, queue, payload, created_at, claimed
            "#,
            config.claim_order.direction()
        );

        Self {
            pool,
            default_queue: normalize_queue_name(&config.default_queue),
            pop_sql,
            codec: Arc::new(JsonCodec),
            id_provider: Arc::new(UuidProvider),
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_providers(
        mut self,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        self.id_provider = id_provider;
        self.time_provider = time_provider;
        self
    }

    fn queue_name(&self, queue: Option<&str>) -> QueueName {
        resolve_queue_name(queue, &self.default_queue)
    }

    fn decode(&self, operation: &'static str, row: ItemRow) -> Result<QueuedItem> {
        row.into_item(self.codec.as_ref())
            .map_err(|e| QueueError::read(operation, e))
    }
}

#[async_trait]
impl QueueDriver for SqliteQueueDriver {
    async fn push(&self, input: PushInput, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        let queue = self.queue_name(queue.or(input.queue_hint()));

        let item = match input {
            PushInput::Payload(payload) => QueuedItem::new(
                self.id_provider.generate_id(),
                &queue,
                payload,
                self.time_provider.now_secs(),
            ),
            PushInput::Queued(item) => item.with_queue(&queue).into_unclaimed(),
        };

        let encoded = self
            .codec
            .encode(&item)
            .map_err(|e| QueueError::write("push", e))?;

        sqlx::query(
            r#"
            INSERT INTO queue_items (id, queue, payload, created_at, claimed)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(item.id())
        .bind(item.queue())
        .bind(encoded)
        .bind(item.created_at())
        .execute(&self.pool)
        .await
        .map_err(write_error("push"))?;

        debug!(item_id = %item.id(), queue = %item.queue(), "Pushed item");
        Ok(Some(item))
    }

    async fn pop(&self, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        let queue = self.queue_name(queue);

        let row = sqlx::query_as::<_, ItemRow>(&self.pop_sql)
            .bind(&queue)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("pop"))?;

        match row {
            Some(row) => {
                let item = self.decode("pop", row)?;
                debug!(item_id = %item.id(), queue = %queue, "Claimed item");
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    async fn release(&self, id: &str, queue: Option<&str>) -> Result<()> {
        let queue = self.queue_name(queue);

        let result = sqlx::query("DELETE FROM queue_items WHERE id = ? AND queue = ?")
            .bind(id)
            .bind(&queue)
            .execute(&self.pool)
            .await
            .map_err(write_error("release"))?;

        debug!(
            item_id = %id,
            queue = %queue,
            deleted = result.rows_affected(),
            "Released item"
        );
        Ok(())
    }

    async fn find_by_id(&self, id: &str, queue: Option<&str>) -> Result<Option<QueuedItem>> {
        let queue = self.queue_name(queue);

        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, queue, payload, created_at, claimed
            FROM queue_items
            WHERE id = ? AND queue = ?
            "#,
        )
        .bind(id)
        .bind(&queue)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error("find_by_id"))?;

        row.map(|r| self.decode("find_by_id", r)).transpose()
    }

    async fn size(&self, queue: Option<&str>) -> Result<u64> {
        let queue = self.queue_name(queue);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_items WHERE queue = ?")
            .bind(&queue)
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("size"))?;

        Ok(count.max(0) as u64)
    }

    async fn list_queues(&self) -> Result<Vec<QueueName>> {
        sqlx::query_scalar("SELECT DISTINCT queue FROM queue_items ORDER BY queue")
            .fetch_all(&self.pool)
            .await
            .map_err(read_error("list_queues"))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    queue: String,
    payload: Vec<u8>,
    created_at: i64,
    claimed: bool,
}

impl ItemRow {
    // Columns are authoritative for identity and claim state; the blob only
    // contributes the payload
    fn into_item(self, codec: &dyn PayloadCodec) -> std::result::Result<QueuedItem, CodecError> {
        let decoded = codec.decode(&self.payload)?;
        Ok(QueuedItem::restore(
            self.id,
            &self.queue,
            decoded.into_payload(),
            self.created_at,
            self.claimed,
        ))
    }
}
