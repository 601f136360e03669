//! Client configuration: queue, transport and retry policy.

use std::path::Path;
use std::time::Duration;

use aws_config::SdkConfig;
use aws_sdk_sqs::config::Credentials;
use serde::Deserialize;
use thiserror::Error;

/// Largest batch SQS hands out or accepts in one call.
pub const MAX_BATCH_SIZE: i32 = 10;
/// Longest long-poll wait SQS accepts, in seconds.
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Failure to load or validate a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How deferred messages are retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deferrals past this attempt count acknowledge the message instead.
    pub max_retry_count: u32,
    /// Unit of the requeue delay; the delay is `retry_timestep * attempt_count`.
    pub retry_timestep: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: default_max_retry_count(),
            retry_timestep: Duration::from_secs(default_retry_timestep_seconds()),
        }
    }
}

/// Static configuration of a [`Client`](crate::Client).
///
/// Every field but `queue_name` has a default, so a config file only needs
/// the values it changes:
///
/// ```json
/// { "queue_name": "orders", "region": "ru-central1", "max_retry_count": 4 }
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Name of the queue; created on first use if it does not exist
    pub queue_name: String,
    /// Region; falls back to the SDK's provider chain when unset
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint override, e.g. LocalStack or a non-AWS SQS implementation
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Max messages per receive call (1..=10)
    #[serde(default = "default_batch_size")]
    pub batch_size: i32,
    /// Long-poll wait per receive call (0..=20)
    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: i32,
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,
    #[serde(default = "default_retry_timestep_seconds")]
    pub retry_timestep_seconds: u64,
}

fn default_batch_size() -> i32 {
    MAX_BATCH_SIZE
}

fn default_wait_time_seconds() -> i32 {
    10
}

fn default_max_retry_count() -> u32 {
    4
}

fn default_retry_timestep_seconds() -> u64 {
    1
}

impl Config {
    /// Config for `queue_name` with every other field at its default.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            region: None,
            endpoint_url: None,
            access_key: None,
            secret_access_key: None,
            batch_size: default_batch_size(),
            wait_time_seconds: default_wait_time_seconds(),
            max_retry_count: default_max_retry_count(),
            retry_timestep_seconds: default_retry_timestep_seconds(),
        }
    }

    /// Reads a JSON config file and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`] if the file
    /// cannot be read or parsed, and [`ConfigError::Invalid`] if
    /// [`Config::validate`] rejects it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the fields that cannot be clamped into range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the queue name is blank or only
    /// one half of the static credentials is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_name.trim().is_empty() {
            return Err(ConfigError::Invalid("queue_name must not be empty".into()));
        }
        if self.access_key.is_some() != self.secret_access_key.is_some() {
            return Err(ConfigError::Invalid(
                "access_key and secret_access_key must be set together".into(),
            ));
        }
        Ok(())
    }

    /// Retry policy used to classify deferred messages.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retry_count: self.max_retry_count,
            retry_timestep: Duration::from_secs(self.retry_timestep_seconds),
        }
    }

    /// Batch size clamped to what SQS accepts.
    pub fn receive_batch_size(&self) -> i32 {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Wait time clamped to what SQS accepts.
    pub fn receive_wait_time(&self) -> i32 {
        self.wait_time_seconds.clamp(0, MAX_WAIT_TIME_SECONDS)
    }

    /// Loads the AWS SDK configuration for this queue.
    ///
    /// Explicit region, endpoint and static credentials win; anything unset
    /// comes from the SDK's usual environment and profile chain.
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let (Some(access_key), Some(secret_access_key)) =
            (&self.access_key, &self.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_access_key,
                None,
                None,
                "static",
            ));
        }
        loader.load().await
    }
}
