//! CLI configuration management.

use portal_cache::CompressionType;
use portal_offline::OfflineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Directory holding the cache generations.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Offline cache manager settings.
    #[serde(default)]
    pub offline: OfflineConfig,
    /// Compression for stored bodies.
    #[serde(default)]
    pub compression: CompressionType,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("uk.org", "waterbear", "portal")
        .map(|dirs| dirs.cache_dir().join("generations"))
        .unwrap_or_else(|| PathBuf::from(".portal-cache"))
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            offline: OfflineConfig::default(),
            compression: CompressionType::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl CliConfig {
    /// Load configuration from file.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, falling back to defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let dirs = directories::ProjectDirs::from("uk.org", "waterbear", "portal")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "cache_dir" => self.cache_dir = PathBuf::from(value),
            "compression" => {
                self.compression = match value {
                    "none" => CompressionType::None,
                    "zstd" => CompressionType::Zstd,
                    "gzip" => CompressionType::Gzip,
                    _ => return Err(format!("Invalid compression: {}", value)),
                };
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout: {}", value))?;
            }
            "version" => self.offline.version = value.to_string(),
            "origin" => {
                self.offline.origin =
                    Url::parse(value).map_err(|e| format!("Invalid origin {}: {}", value, e))?;
            }
            "cms_host" => self.offline.cms_host = value.to_string(),
            "shell_document" => self.offline.shell_document = value.to_string(),
            "skip_waiting_on_install" => {
                self.offline.skip_waiting_on_install = value
                    .parse()
                    .map_err(|_| format!("Invalid boolean: {}", value))?;
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_known_keys() {
        let mut config = CliConfig::default();
        config.set("compression", "gzip").unwrap();
        config.set("version", "waterbear-portal-v2").unwrap();
        config.set("skip_waiting_on_install", "false").unwrap();
        config.set("request_timeout_secs", "5").unwrap();

        assert_eq!(config.compression, CompressionType::Gzip);
        assert_eq!(config.offline.version, "waterbear-portal-v2");
        assert!(!config.offline.skip_waiting_on_install);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = CliConfig::default();
        assert!(config.set("compression", "brotli").is_err());
        assert!(config.set("origin", "not a url").is_err());
        assert!(config.set("colour", "blue").is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CliConfig = serde_yaml::from_str(
            "cache_dir: /tmp/portal\noffline:\n  version: waterbear-portal-v9\n",
        )
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/portal"));
        assert_eq!(config.offline.version, "waterbear-portal-v9");
        assert_eq!(config.offline.cms_host, "cdn.contentful.com");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_saved_config_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = CliConfig::default();
        config.set("cache_dir", "/var/cache/portal").unwrap();
        config.set("version", "waterbear-portal-v3").unwrap();
        config.save_to(&path).unwrap();

        let reloaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.cache_dir, PathBuf::from("/var/cache/portal"));
        assert_eq!(reloaded.offline.version, "waterbear-portal-v3");
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.request_timeout_secs, 30);
    }
}
