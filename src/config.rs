//! Runtime configuration for the orchestration layer.
//!
//! Defaults carry the constants the engine was tuned against. Any of them can
//! be overridden from the environment (or a `.env` file during development).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{ServiceError, ServiceResult};

pub const ENV_TELEMETRY_INTERVAL_SECS: &str = "ORCHESTRATOR_TELEMETRY_INTERVAL_SECS";
pub const ENV_BACKGROUND_GRANT_SECS: &str = "ORCHESTRATOR_BACKGROUND_GRANT_SECS";
pub const ENV_EXPORT_POLL_ATTEMPTS: &str = "ORCHESTRATOR_EXPORT_POLL_ATTEMPTS";
pub const ENV_EXPORT_POLL_INTERVAL_MS: &str = "ORCHESTRATOR_EXPORT_POLL_INTERVAL_MS";
pub const ENV_MAX_COMPRESS_REQUEST_BYTES: &str = "ORCHESTRATOR_MAX_COMPRESS_REQUEST_BYTES";

/// Bounded polling for export jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ExportPollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionCoordinatorConfig {
    pub telemetry_interval: Duration,
    /// Seconds reported to the engine when the OS grants a background window.
    /// The OS does not tell us the real figure up front; 30s is what iOS
    /// usually grants for `beginBackgroundTask`.
    pub background_grant_seconds: u32,
    pub max_compress_request_bytes: usize,
    pub command_queue_depth: usize,
    pub publisher_queue_depth: usize,
    pub background_task_name: String,
}

impl Default for CompressionCoordinatorConfig {
    fn default() -> Self {
        Self {
            telemetry_interval: Duration::from_secs(30),
            background_grant_seconds: 30,
            max_compress_request_bytes: 50_000,
            command_queue_depth: 100,
            publisher_queue_depth: 32,
            background_task_name: "compression_background_task".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub export_poll: ExportPollConfig,
    pub compression: CompressionCoordinatorConfig,
}

impl OrchestratorConfig {
    /// Build a config from defaults, `.env` and process environment.
    pub fn from_env() -> ServiceResult<Self> {
        // A missing .env file is the normal case on device
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_positive::<u64, _>(&lookup, ENV_TELEMETRY_INTERVAL_SECS)? {
            config.compression.telemetry_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_positive::<u32, _>(&lookup, ENV_BACKGROUND_GRANT_SECS)? {
            config.compression.background_grant_seconds = secs;
        }
        if let Some(bytes) = parse_positive::<usize, _>(&lookup, ENV_MAX_COMPRESS_REQUEST_BYTES)? {
            config.compression.max_compress_request_bytes = bytes;
        }
        if let Some(attempts) = parse_positive::<u32, _>(&lookup, ENV_EXPORT_POLL_ATTEMPTS)? {
            config.export_poll.max_attempts = attempts;
        }
        if let Some(ms) = parse_positive::<u64, _>(&lookup, ENV_EXPORT_POLL_INTERVAL_MS)? {
            config.export_poll.interval = Duration::from_millis(ms);
        }

        log::debug!("Orchestrator config: {:?}", config);
        Ok(config)
    }
}

fn parse_positive<T, F>(lookup: &F, key: &str) -> ServiceResult<Option<T>>
where
    T: FromStr + PartialEq + Default,
    F: Fn(&str) -> Option<String>,
{
    let raw = match lookup(key) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let value = raw.trim().parse::<T>().map_err(|_| {
        ServiceError::Configuration(format!("{} must be a positive integer, got '{}'", key, raw))
    })?;
    if value == T::default() {
        return Err(ServiceError::Configuration(format!("{} must be greater than zero", key)));
    }
    Ok(Some(value))
}
