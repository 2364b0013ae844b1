// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::eventhub::{
    ConnectionProperties, ConnectionStringError, ProducerClientOptions, RetryStrategy,
    DEFAULT_MAX_BATCH_SIZE_BYTES,
};

const DEFAULT_PAYLOAD_FILE: &str = "alerts.json";
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 5;
const DEFAULT_RETRY_ATTEMPTS: u64 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;
const DEFAULT_SAS_TTL_SECS: u64 = 3600;
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid connection string: {0}")]
    ConnectionString(#[from] ConnectionStringError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Producer settings, normally read from the environment.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub connection: ConnectionProperties,
    pub event_hub: String,
    /// Free-form label shown in the start-up banner (e.g. `dev`, `prod`)
    pub build_env: String,
    pub payload_file: PathBuf,
    /// Deadline for one batch submission, retries included
    pub send_timeout: Duration,
    pub max_batch_size_bytes: usize,
    pub retry_attempts: u64,
    /// 0 retries immediately
    pub retry_backoff_ms: u64,
    pub sas_ttl: Duration,
    pub log_level: String,
    pub https_proxy: Option<String>,
    /// Base URL override, primarily for integration tests
    pub endpoint_override: Option<String>,
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(format!("{name} must be a number, got '{val}'"))),
        _ => Ok(default),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|val| !val.trim().is_empty())
}

impl ProducerConfig {
    /// Builds the configuration from `EVENTHUB_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let connection_string = non_empty_env("EVENTHUB_CONNECTION_STRING")
            .ok_or(ConfigError::Missing("EVENTHUB_CONNECTION_STRING"))?;
        let connection: ConnectionProperties = connection_string.parse()?;

        let event_hub = match (non_empty_env("EVENTHUB_NAME"), &connection.entity_path) {
            (Some(name), _) => name,
            (None, Some(entity_path)) => entity_path.clone(),
            (None, None) => return Err(ConfigError::Missing("EVENTHUB_NAME")),
        };

        let config = Self {
            connection,
            event_hub,
            build_env: non_empty_env("BUILD_ENV").unwrap_or_else(|| "unknown".to_string()),
            payload_file: non_empty_env("EVENTHUB_PAYLOAD_FILE")
                .unwrap_or_else(|| DEFAULT_PAYLOAD_FILE.to_string())
                .into(),
            send_timeout: Duration::from_secs(parse_env(
                "EVENTHUB_SEND_TIMEOUT_SECS",
                DEFAULT_SEND_TIMEOUT_SECS,
            )?),
            max_batch_size_bytes: parse_env(
                "EVENTHUB_MAX_BATCH_BYTES",
                DEFAULT_MAX_BATCH_SIZE_BYTES,
            )?,
            retry_attempts: parse_env("EVENTHUB_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS)?,
            retry_backoff_ms: parse_env("EVENTHUB_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS)?,
            sas_ttl: Duration::from_secs(parse_env("EVENTHUB_SAS_TTL_SECS", DEFAULT_SAS_TTL_SECS)?),
            log_level: non_empty_env("EVENTHUB_LOG_LEVEL")
                .map(|val| val.trim().to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            https_proxy: non_empty_env("EVENTHUB_PROXY_HTTPS").or_else(|| non_empty_env("HTTPS_PROXY")),
            endpoint_override: non_empty_env("EVENTHUB_ENDPOINT_OVERRIDE"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_hub.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "event hub name cannot be empty".to_string(),
            ));
        }

        if let Some(entity_path) = &self.connection.entity_path {
            if entity_path != &self.event_hub {
                return Err(ConfigError::Invalid(format!(
                    "EVENTHUB_NAME '{}' does not match the connection string EntityPath '{}'",
                    self.event_hub, entity_path
                )));
            }
        }

        if self.send_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "EVENTHUB_SEND_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_batch_size_bytes == 0 {
            return Err(ConfigError::Invalid(
                "EVENTHUB_MAX_BATCH_BYTES must be greater than 0".to_string(),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "EVENTHUB_RETRY_ATTEMPTS must be greater than 0".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        if self.retry_backoff_ms == 0 {
            RetryStrategy::Immediate(self.retry_attempts)
        } else {
            RetryStrategy::LinearBackoff(self.retry_attempts, self.retry_backoff_ms)
        }
    }

    /// Per-request HTTP timeout. Every attempt plus the backoff between attempts fits
    /// inside `send_timeout`, so a hung request still leaves room for its retry.
    pub fn request_timeout(&self) -> Duration {
        let attempts = u32::try_from(self.retry_attempts.max(1)).unwrap_or(u32::MAX);
        let backoff = Duration::from_millis(self.retry_backoff_ms).saturating_mul(attempts - 1);
        (self.send_timeout.saturating_sub(backoff) / attempts).max(MIN_REQUEST_TIMEOUT)
    }

    pub fn client_options(&self) -> ProducerClientOptions {
        ProducerClientOptions {
            max_batch_size_bytes: self.max_batch_size_bytes,
            retry_strategy: self.retry_strategy(),
            request_timeout: self.request_timeout(),
            token_ttl: self.sas_ttl,
            https_proxy: self.https_proxy.clone(),
            endpoint_override: self.endpoint_override.clone(),
        }
    }
}
