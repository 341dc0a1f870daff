//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use qmux_infra_sqlite::{
    create_pool, run_migrations, ClaimOrder, PoolConfig, SqliteDriverConfig, SqliteQueueDriver,
};
use sqlx::SqlitePool;

/// On-disk database removed when dropped (WAL needs a real file for
/// multi-connection tests)
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("qmux_test_{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    pub async fn pool(&self) -> SqlitePool {
        let pool = create_pool(&self.url(), &PoolConfig::default())
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    pub async fn driver(&self) -> Arc<SqliteQueueDriver> {
        Arc::new(SqliteQueueDriver::new(
            self.pool().await,
            SqliteDriverConfig::default(),
        ))
    }

    pub async fn driver_with_order(&self, claim_order: ClaimOrder) -> Arc<SqliteQueueDriver> {
        let config = SqliteDriverConfig {
            claim_order,
            ..Default::default()
        };
        Arc::new(SqliteQueueDriver::new(self.pool().await, config))
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// Fresh in-memory driver (single connection)
pub async fn memory_driver() -> Arc<SqliteQueueDriver> {
    let pool = create_pool("sqlite::memory:", &PoolConfig::default())
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteQueueDriver::new(pool, SqliteDriverConfig::default()))
}
