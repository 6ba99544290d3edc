//! Uploader configuration.
//!
//! Stored as TOML. Every field has a default, so an empty file (or no file)
//! yields a working configuration:
//!
//! ```toml
//! initiation_url = "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status,contentDetails"
//! probe_interval_ms = 5000
//! retry_budget = -1
//!
//! [backoff]
//! initial_delay_ms = 1000
//! max_delay_ms = 30000
//! factor = 2.0
//! ```

use std::path::Path;
use std::time::Duration;

use resumable_protocol::RetryBudget;
use resumable_protocol::constants::{DEFAULT_INITIATION_URL, DEFAULT_PROBE_INTERVAL};
use rand::Rng;
use resumable_transfer::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Endpoint the session creation request is posted to.
    #[serde(default = "default_initiation_url")]
    pub initiation_url: String,

    /// Interval between progress probes while monitoring.
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// Read size when streaming the source.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks buffered between the source and the request body.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Budget given to fresh sessions. `-1` retries forever.
    #[serde(default)]
    pub retry_budget: RetryBudget,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_initiation_url() -> String {
    DEFAULT_INITIATION_URL.to_string()
}

fn default_probe_interval_ms() -> u64 {
    DEFAULT_PROBE_INTERVAL.as_millis() as u64
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("resumable-upload/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            initiation_url: default_initiation_url(),
            probe_interval_ms: default_probe_interval_ms(),
            chunk_size: default_chunk_size(),
            channel_capacity: default_channel_capacity(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_budget: RetryBudget::default(),
            user_agent: default_user_agent(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl UploaderConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration from `path`, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Delay policy between a failure and the probe that precedes a resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first resume. `0` disables waiting altogether.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts (backoff cap).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier for each subsequent attempt.
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_factor() -> f64 {
    2.0
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
        }
    }
}

impl BackoffConfig {
    /// No waiting between attempts.
    pub fn none() -> Self {
        Self {
            initial_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Delay for a given attempt number (1-based) before jitter.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.initial_delay_ms == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let initial = self.initial_delay_ms as f64 / 1000.0;
        let secs = initial * self.factor.max(1.0).powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay_ms as f64 / 1000.0))
    }

    /// Calculates the delay for a given attempt number (1-based),
    /// with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped = self.base_delay_for_attempt(attempt).as_secs_f64();
        if capped == 0.0 {
            return Duration::ZERO;
        }
        let offset: f64 = rand::thread_rng().gen_range(-1.0..1.0);
        Duration::from_secs_f64((capped + capped * 0.25 * offset).max(0.0))
    }
}
