//! Configuration loader for YAML files and environment overrides

use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::types::JewelsConfig;
use crate::errors::JewelsError;

pub const ENV_API_URL: &str = "GEN_JEWELS_API_URL";
pub const ENV_STORAGE_PATH: &str = "GEN_JEWELS_STORAGE_PATH";
pub const ENV_LOG_LEVEL: &str = "GEN_JEWELS_LOG_LEVEL";

pub struct ConfigLoader;

impl ConfigLoader {
    /// `<config dir>/gen-jewels/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gen-jewels").join("config.yaml"))
    }

    /// Load from an explicit path, or the default path when it exists, or
    /// fall back to defaults. Environment overrides apply in every case.
    pub async fn load(path: Option<&Path>) -> Result<JewelsConfig, JewelsError> {
        let mut config = match path {
            Some(path) => Self::read_file(path).await?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::read_file(&default).await?,
                _ => {
                    log::debug!("No configuration file found, using defaults");
                    JewelsConfig::default()
                }
            },
        };

        Self::apply_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<JewelsConfig, JewelsError> {
        let mut config = Self::read_file(path.as_ref()).await?;
        Self::apply_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn from_str(content: &str) -> Result<JewelsConfig, JewelsError> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    async fn read_file(path: &Path) -> Result<JewelsConfig, JewelsError> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            JewelsError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<JewelsConfig, JewelsError> {
        if content.trim().is_empty() {
            return Ok(JewelsConfig::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| JewelsError::ConfigError(format!("Failed to parse YAML config: {}", e)))
    }

    fn apply_env_overrides(config: &mut JewelsConfig) {
        if let Ok(url) = env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                config.api.base_url = url.trim().to_string();
            }
        }
        if let Ok(path) = env::var(ENV_STORAGE_PATH) {
            if !path.trim().is_empty() {
                config.storage.path = Some(PathBuf::from(path));
            }
        }
        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            if !level.trim().is_empty() {
                config.logging.level = level.trim().to_string();
            }
        }
    }
}
