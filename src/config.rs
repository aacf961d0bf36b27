//! Application settings persisted as TOML in the user's config directory.
//!
//! A missing file yields the defaults so the tool always starts; a file that
//! exists but cannot be parsed is reported to the caller.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "shutter-setup";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No user config directory available")]
    NoConfigDir,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Broker connection settings edited in the settings panel.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    /// `host`, `host:port`, `tcp://host:port` or `mqtt://host:port`
    pub url: String,
    pub client_id: String,
    pub user: String,
    pub password: String,
    pub keep_alive_secs: u64,
    /// Pause between failed connect attempts
    pub reconnect_delay_ms: u64,
    /// Capacity of the client request queue
    pub request_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "localhost:1883".to_string(),
            client_id: "shutter-setup".to_string(),
            user: String::new(),
            password: String::new(),
            keep_alive_secs: 5,
            reconnect_delay_ms: 2000,
            request_capacity: 100,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Root of the discovery topic tree
    pub prefix: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            prefix: "homeassistant".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub discovery: DiscoveryConfig,
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    pub async fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?).await
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if !exists {
            warn!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path()?).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("shutter-setup-{}-{}", std::process::id(), name));
        path.push(CONFIG_FILE);
        path
    }

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let path = scratch_path("missing");
        let config = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.discovery.prefix, "homeassistant");
    }

    #[tokio::test]
    async fn saved_settings_are_loaded_back() {
        let path = scratch_path("saved");
        let mut config = AppConfig::default();
        config.broker.url = "tcp://broker.lan:1884".to_string();
        config.broker.user = "installer".to_string();
        config.broker.password = "pw".to_string();

        config.save_to(&path).await.unwrap();
        let loaded = AppConfig::load_from(&path).await.unwrap();

        assert_eq!(loaded, config);
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[test]
    fn partial_file_fills_remaining_fields_with_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [broker]
            url = "broker.lan"
            "#,
        )
        .unwrap();

        assert_eq!(config.broker.url, "broker.lan");
        assert_eq!(config.broker.reconnect_delay_ms, 2000);
        assert_eq!(config.discovery, DiscoveryConfig::default());
    }

    #[tokio::test]
    async fn malformed_file_is_reported() {
        let path = scratch_path("malformed");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "[broker\nurl = ").await.unwrap();

        let result = AppConfig::load_from(&path).await;

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
