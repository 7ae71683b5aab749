//! Configuration type definitions
//!
//! Every section is optional in YAML; an empty file yields a client pointed at
//! a local backend with the recovery timings the web client shipped with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::JewelsError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JewelsConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    /// Static headers sent with every request (tunnel bypass headers and such)
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
            extra_headers: BTreeMap::new(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
    /// How recent the newest history entry must be to count as the result of
    /// an interrupted generation
    #[serde(default = "default_recency_window_secs")]
    pub recency_window_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            recency_window_secs: default_recency_window_secs(),
        }
    }
}

impl SessionConfig {
    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            recency_window: chrono::Duration::seconds(self.recency_window_secs as i64),
        }
    }
}

/// Resolved timers for the recovery poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionTimings {
    pub poll_interval: Duration,
    pub recovery_timeout: Duration,
    pub recency_window: chrono::Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        SessionConfig::default().timings()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval_secs(),
            timeout_secs: default_health_timeout_secs(),
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured path, or `<data dir>/gen-jewels/session.json`
    pub fn resolved_path(&self) -> Result<PathBuf, JewelsError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        dirs::data_local_dir()
            .map(|dir| dir.join("gen-jewels").join("session.json"))
            .ok_or_else(|| {
                JewelsError::ConfigError(
                    "could not determine a data directory; set storage.path".to_string(),
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_generation_timeout_secs() -> u64 {
    600
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_recovery_timeout_secs() -> u64 {
    90
}

fn default_recency_window_secs() -> u64 {
    120
}

fn default_health_interval_secs() -> u64 {
    60
}

fn default_health_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl JewelsConfig {
    pub fn validate(&self) -> Result<(), JewelsError> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(JewelsError::ConfigError("api.base_url must not be empty".to_string()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(JewelsError::ConfigError(format!(
                "api.base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        if self.api.timeout_secs == 0 || self.api.generation_timeout_secs == 0 {
            return Err(JewelsError::ConfigError("api timeouts must be positive".to_string()));
        }

        let session = &self.session;
        if session.poll_interval_secs == 0
            || session.recovery_timeout_secs == 0
            || session.recency_window_secs == 0
        {
            return Err(JewelsError::ConfigError(
                "session intervals must be positive".to_string(),
            ));
        }
        if session.poll_interval_secs >= session.recovery_timeout_secs {
            return Err(JewelsError::ConfigError(format!(
                "session.poll_interval_secs ({}) must be shorter than session.recovery_timeout_secs ({})",
                session.poll_interval_secs, session.recovery_timeout_secs
            )));
        }

        if self.health.interval_secs == 0 || self.health.timeout_secs == 0 {
            return Err(JewelsError::ConfigError("health intervals must be positive".to_string()));
        }

        for name in self.api.extra_headers.keys() {
            let valid = !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
            if !valid {
                return Err(JewelsError::ConfigError(format!(
                    "invalid header name in api.extra_headers: '{}'",
                    name
                )));
            }
        }

        Ok(())
    }
}
