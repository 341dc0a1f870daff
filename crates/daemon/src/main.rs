//! qmux worker daemon
//! Opens the SQLite store, builds the channel aggregate and runs a worker on it

mod config;

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{DaemonConfig, LogFormat};
use qmux_core::application::{
    handler_fn, shutdown_channel, HandlerError, PayloadDispatcher, Worker, WorkerConfig,
};
use qmux_core::AggregateQueue;
use qmux_infra_sqlite::{
    create_pool, run_migrations, PoolConfig, SqliteDriverConfig, SqliteQueueDriver,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::from_env()?;

    // 1. Logging (keep the guard alive so the file writer flushes on exit)
    let _log_guard = init_logging(&config)?;
    info!("qmux worker v{} starting...", VERSION);

    // 2. Store
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    info!(db_path = %config.db_path.display(), "Initializing database...");

    let pool = create_pool(&config.database_url(), &PoolConfig::default())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. One driver per channel, all on the shared pool
    let mut aggregate = AggregateQueue::new();
    for channel in &config.channels {
        let driver = SqliteQueueDriver::new(
            pool.clone(),
            SqliteDriverConfig {
                default_queue: channel.name.clone(),
                claim_order: config.claim_order,
            },
        );
        aggregate.add_channel(&channel.name, Arc::new(driver), channel.weight)?;
        info!(channel = %channel.name, weight = channel.weight, "Channel registered");
    }

    // 4. Worker
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let worker = Worker::new(
        Arc::new(aggregate),
        Arc::new(builtin_dispatcher()),
        WorkerConfig::default(),
    );

    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker.run(shutdown_rx).await {
            tracing::error!(error = ?e, "Worker failed");
        }
    });

    info!("System ready. Waiting for items...");
    info!("Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, worker_handle).await.is_err() {
        tracing::warn!("Worker did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

fn init_logging(config: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("qmux=info"))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "qmux-worker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(file_layer)
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(file_layer)
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init(),
    };
    installed.context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Handlers available to every payload without extra wiring
fn builtin_dispatcher() -> PayloadDispatcher {
    let mut dispatcher = PayloadDispatcher::new();
    dispatcher
        .register(
            "log",
            handler_fn(|args: Vec<Value>| async move {
                let args = Value::Array(args);
                info!(args = %args, "log payload");
                Ok::<(), HandlerError>(())
            }),
        )
        .register(
            "sleep",
            handler_fn(|args: Vec<Value>| async move {
                let millis = args
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or_else(|| HandlerError::Failed("sleep expects milliseconds".into()))?;
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok::<(), HandlerError>(())
            }),
        );
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmux_core::application::worker::Dispatch;
    use qmux_core::domain::{Payload, QueuedItem};
    use serde_json::json;

    fn item(payload: Value) -> QueuedItem {
        QueuedItem::new("id", "general", Payload::new(payload), 0)
    }

    #[tokio::test]
    async fn test_builtin_log_handler() {
        let dispatcher = builtin_dispatcher();
        assert!(dispatcher.has_handler("log"));

        let result = dispatcher
            .dispatch(&item(json!({"fun": "log", "args": ["hello", 1]})))
            .await
            .unwrap();
        assert_eq!(result, Dispatch::Executed);
    }

    #[tokio::test]
    async fn test_builtin_sleep_handler() {
        let dispatcher = builtin_dispatcher();

        let result = dispatcher
            .dispatch(&item(json!({"fun": "sleep", "args": [1]})))
            .await
            .unwrap();
        assert_eq!(result, Dispatch::Executed);

        let err = dispatcher
            .dispatch(&item(json!({"fun": "sleep", "args": ["soon"]})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));

        let err = dispatcher
            .dispatch(&item(json!({"fun": "sleep"})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));
    }
}
