// Migration Runner

use qmux_core::error::QueueError;
use sqlx::SqlitePool;
use tracing::info;

const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "Queue items",
    include_str!("../migrations/001_queue_items.sql"),
)];

/// Run database migrations (idempotent)
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), QueueError> {
    info!("Running database migrations...");

    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| QueueError::read("migrate", e))?;

    let current_version: i64 = if table_exists > 0 {
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await
            .map_err(|e| QueueError::read("migrate", e))
            .map(|v: Option<i64>| v.unwrap_or(0))?
    } else {
        0
    };

    info!(current_version, "Current schema version");

    for (version, name, sql) in MIGRATIONS {
        if current_version < *version {
            info!(version, name, "Applying migration");
            apply_migration(pool, sql).await?;
        }
    }

    info!("All migrations applied successfully");
    Ok(())
}

/// Apply a single migration SQL file inside one transaction
async fn apply_migration(pool: &SqlitePool, sql: &str) -> Result<(), QueueError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| QueueError::write("migrate", e))?;

    for statement in sql.split(';') {
        let clean_statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if !clean_statement.is_empty() {
            sqlx::query(&clean_statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| QueueError::write("migrate", e))?;
        }
    }

    tx.commit()
        .await
        .map_err(|e| QueueError::write("migrate", e))?;
    Ok(())
}
