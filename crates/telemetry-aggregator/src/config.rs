// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::ingest::{DEFAULT_MAX_BODY_BYTES, DEFAULT_STORE_TIMEOUT, DEFAULT_VERSION_TAG};

pub const ENV_PUSHGATEWAY_ADDR: &str = "PUSHGATEWAY_ADDR";
pub const ENV_PUSHGATEWAY_JOB: &str = "PUSHGATEWAY_JOB";
pub const ENV_HOST: &str = "AGGREGATOR_HOST";
pub const ENV_PORT: &str = "AGGREGATOR_PORT";
pub const ENV_DB_PATH: &str = "AGGREGATOR_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "AGGREGATOR_LOG_LEVEL";
pub const ENV_VERSION_TAG: &str = "AGGREGATOR_VERSION_TAG";
pub const ENV_STORE_TIMEOUT_SECS: &str = "AGGREGATOR_STORE_TIMEOUT_SECS";
pub const ENV_PUSH_TIMEOUT_SECS: &str = "AGGREGATOR_PUSH_TIMEOUT_SECS";
pub const ENV_FORWARDER_WORKERS: &str = "AGGREGATOR_FORWARDER_WORKERS";
pub const ENV_FORWARDER_QUEUE: &str = "AGGREGATOR_FORWARDER_QUEUE";
pub const ENV_MAX_BODY_BYTES: &str = "AGGREGATOR_MAX_BODY_BYTES";
pub const ENV_HTTPS_PROXY: &str = "HTTPS_PROXY";

pub const DEFAULT_PUSHGATEWAY_JOB: &str = "collect_fogbow_metric";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Runtime configuration of the aggregator
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Pushgateway
    pub pushgateway_addr: String,
    /// Job grouping key metrics are pushed under
    pub pushgateway_job: String,
    pub host: String,
    pub port: u16,
    /// Directory of the sled database
    pub db_path: String,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    pub version_tag: String,
    pub store_timeout: Duration,
    pub push_timeout: Duration,
    pub forwarder_workers: usize,
    pub forwarder_queue: usize,
    pub max_body_bytes: usize,
    pub https_proxy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pushgateway_addr: "http://localhost:9091".to_string(),
            pushgateway_job: DEFAULT_PUSHGATEWAY_JOB.to_string(),
            host: "0.0.0.0".to_string(),
            port: 8090,
            db_path: "aggregator.db".to_string(),
            log_level: "info".to_string(),
            version_tag: DEFAULT_VERSION_TAG.to_string(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            push_timeout: Duration::from_secs(5),
            forwarder_workers: 4,
            forwarder_queue: 1024,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            https_proxy: None,
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let pushgateway_addr = env::var(ENV_PUSHGATEWAY_ADDR)
            .ok()
            .filter(|addr| !addr.trim().is_empty())
            .map(|addr| normalize_sink_address(addr.trim()))
            .ok_or(ConfigError::Missing(ENV_PUSHGATEWAY_ADDR))?;

        let config = Self {
            pushgateway_addr,
            pushgateway_job: env::var(ENV_PUSHGATEWAY_JOB).unwrap_or(defaults.pushgateway_job),
            host: env::var(ENV_HOST).unwrap_or(defaults.host),
            port: parse_var(ENV_PORT, defaults.port)?,
            db_path: env::var(ENV_DB_PATH).unwrap_or(defaults.db_path),
            log_level: env::var(ENV_LOG_LEVEL)
                .map(|val| val.to_lowercase())
                .unwrap_or(defaults.log_level),
            version_tag: env::var(ENV_VERSION_TAG).unwrap_or(defaults.version_tag),
            store_timeout: parse_var(ENV_STORE_TIMEOUT_SECS, defaults.store_timeout.as_secs())
                .map(Duration::from_secs)?,
            push_timeout: parse_var(ENV_PUSH_TIMEOUT_SECS, defaults.push_timeout.as_secs())
                .map(Duration::from_secs)?,
            forwarder_workers: parse_var(ENV_FORWARDER_WORKERS, defaults.forwarder_workers)?,
            forwarder_queue: parse_var(ENV_FORWARDER_QUEUE, defaults.forwarder_queue)?,
            max_body_bytes: parse_var(ENV_MAX_BODY_BYTES, defaults.max_body_bytes)?,
            https_proxy: env::var(ENV_HTTPS_PROXY).ok().filter(|p| !p.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "Port must be greater than 0".to_string(),
            ));
        }

        if self.pushgateway_job.is_empty() || self.pushgateway_job.contains('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid Pushgateway job '{}'",
                self.pushgateway_job
            )));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if self.store_timeout.is_zero() || self.push_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.forwarder_workers == 0 || self.forwarder_queue == 0 {
            return Err(ConfigError::InvalidConfig(
                "Forwarder workers and queue capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// `host:port` the ingestion server binds to. The host may be a name to resolve.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

/// The Pushgateway address is commonly given as `host:port`; assume plain http then.
fn normalize_sink_address(addr: &str) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
