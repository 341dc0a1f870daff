//! Daemon configuration read from the environment

use anyhow::{Context, Result};
use qmux_core::application::DEFAULT_CHANNEL_WEIGHT;
use qmux_core::domain::{normalize_queue_name, DEFAULT_QUEUE};
use qmux_core::error::QueueError;
use qmux_infra_sqlite::ClaimOrder;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "~/.qmux/queue.db";

const ENV_DB_PATH: &str = "QMUX_DB_PATH";
const ENV_CHANNELS: &str = "QMUX_CHANNELS";
const ENV_CLAIM_ORDER: &str = "QMUX_CLAIM_ORDER";
const ENV_LOG_FORMAT: &str = "QMUX_LOG_FORMAT";
const ENV_LOG_DIR: &str = "QMUX_LOG_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub weight: u32,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub channels: Vec<ChannelSpec>,
    pub claim_order: ClaimOrder,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup(ENV_DB_PATH).unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let db_path = PathBuf::from(shellexpand::tilde(&db_path).into_owned());

        let channels = match lookup(ENV_CHANNELS) {
            Some(raw) => parse_channels(&raw).context("Invalid QMUX_CHANNELS")?,
            None => vec![ChannelSpec {
                name: DEFAULT_QUEUE.to_string(),
                weight: DEFAULT_CHANNEL_WEIGHT,
            }],
        };

        let claim_order = match lookup(ENV_CLAIM_ORDER) {
            Some(raw) => raw.parse::<ClaimOrder>().context("Invalid QMUX_CLAIM_ORDER")?,
            None => ClaimOrder::default(),
        };

        let log_format = match lookup(ENV_LOG_FORMAT).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let log_dir = lookup(ENV_LOG_DIR)
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()));

        Ok(Self {
            db_path,
            channels,
            claim_order,
            log_format,
            log_dir,
        })
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.db_path.display())
    }
}

/// Parse `name[:weight],...`
///
/// Names are normalized. An omitted weight is the default one; empty entries
/// are skipped.
pub fn parse_channels(raw: &str) -> Result<Vec<ChannelSpec>, QueueError> {
    let mut channels = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, weight) = match entry.split_once(':') {
            Some((name, weight)) => {
                let weight = weight.trim().parse::<u32>().map_err(|_| {
                    QueueError::Configuration(format!(
                        "Channel ({}) has invalid weight: {}",
                        name.trim(),
                        weight
                    ))
                })?;
                (name, weight)
            }
            None => (entry, DEFAULT_CHANNEL_WEIGHT),
        };

        let name = normalize_queue_name(name.trim());
        if name.is_empty() {
            return Err(QueueError::Configuration(format!(
                "Channel entry without a name: {}",
                entry
            )));
        }
        channels.push(ChannelSpec { name, weight });
    }

    if channels.is_empty() {
        return Err(QueueError::Configuration(
            "At least one channel is required".to_string(),
        ));
    }
    Ok(channels)
}
