// qmux Infrastructure - SQLite Adapter
// Implements: QueueDriver with atomic claim

mod connection;
mod migration;
mod queue_driver;

pub use connection::{create_pool, PoolConfig};
pub use migration::run_migrations;
pub use queue_driver::{ClaimOrder, SqliteDriverConfig, SqliteQueueDriver};
