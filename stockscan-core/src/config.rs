use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

const APP_DIR: &str = "stockscan";
const API_BASE_ENV: &str = "STOCKSCAN_API_BASE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Base of the REST API, e.g. `http://localhost:8000/v1`. The stock
    /// notification socket lives under the same origin and path.
    pub api_base_url: String,
    pub reconnect_delay_ms: u64,
    /// Entries kept in the scan history. Zero is treated as one.
    pub history_capacity: usize,
    pub request_timeout_seconds: u64,
    /// Maximum gap between two keystrokes of the same barcode.
    pub scan_timeout_ms: u64,
    pub default_location: Option<String>,
    /// Where the scan history is persisted. Defaults to the config dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/v1".to_string(),
            reconnect_delay_ms: 3_000,
            history_capacity: 100,
            request_timeout_seconds: 15,
            scan_timeout_ms: 50,
            default_location: None,
            data_dir: None,
        }
    }
}

impl ScanConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join(APP_DIR))
    }

    /// Location of the config file, creating its directory if needed.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join("config.json"))
    }

    /// Directory holding the persisted scan history.
    pub fn resolved_data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::config_dir(),
        }
    }

    /// Loads the user config, or writes and returns the defaults when it is
    /// missing or unreadable. `STOCKSCAN_API_BASE` overrides the api base.
    pub fn load() -> Self {
        let mut config = match Self::config_file_path().and_then(|p| Self::from_file(&p)) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "could not load config, using defaults");
                let config = Self::default();
                if let Err(save_err) = config.save() {
                    warn!(error = %save_err, "could not save default config");
                }
                config
            }
        };
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            info!(api_base = %base, "api base overridden from environment");
            config.api_base_url = base;
        }
        config
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::config_file_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_web_client() {
        let config = ScanConfig::default();
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.api_base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn partial_file_falls_back_to_defaults_per_field() {
        let mut path = std::env::temp_dir();
        path.push(format!("stockscan_config_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "api_base_url": "https://inv.example.com/v1", "history_capacity": 20 }"#)
            .unwrap();

        let config = ScanConfig::from_file(&path).unwrap();
        assert_eq!(config.api_base_url, "https://inv.example.com/v1");
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.reconnect_delay_ms, 3_000);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let mut path = std::env::temp_dir();
        path.push(format!("stockscan_config_{}.json", uuid::Uuid::new_v4()));
        let config = ScanConfig {
            default_location: Some("A-1".into()),
            ..ScanConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(ScanConfig::from_file(&path).unwrap(), config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let mut path = std::env::temp_dir();
        path.push(format!("stockscan_config_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ScanConfig::from_file(&path), Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_file(&path);
    }
}
