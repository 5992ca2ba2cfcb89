//! Configuration management
//!
//! This module handles loading, saving, and migrating the gd configuration file.
//! The configuration file is stored in TOML format at ~/.config/gd/config.toml,
//! or under `$GD_CONFIG_DIR` when that is set.
//!
//! PROTECTED FILE: Changes to schema_version require migration support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::resolver::RunParams;

/// Current configuration schema version
///
/// IMPORTANT: Bumping this version requires:
/// 1. Adding a migration step in `ConfigManager::migrate`
/// 2. Updating migration tests
/// 3. Marking the change as BREAKING
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "GD_CONFIG_DIR";

/// Default sort expression for listings
pub const DEFAULT_ORDER_BY: &str = "name asc,modifiedTime desc";

/// Default Drive v3 endpoint
pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/drive/v3";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Default traversal settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Remote store settings
    #[serde(default)]
    pub drive: DriveConfig,
}

/// Default settings for traversal commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Descend into folders
    #[serde(default)]
    pub recurse: bool,

    /// Sort expression passed to the store
    #[serde(default = "default_order_by")]
    pub order_by: String,

    /// Maximum number of files; absent means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,

    /// Leading items to skip
    #[serde(default)]
    pub offset: u64,

    /// Items per page request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Print only paths
    #[serde(default)]
    pub brief: bool,
}

fn default_order_by() -> String {
    DEFAULT_ORDER_BY.to_string()
}

fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            recurse: false,
            order_by: default_order_by(),
            max_items: None,
            offset: 0,
            chunk_size: default_chunk_size(),
            brief: false,
        }
    }
}

impl Defaults {
    /// Run parameters before any command-line overrides
    pub fn to_run_params(&self) -> RunParams {
        RunParams {
            recurse: self.recurse,
            order_by: Some(self.order_by.clone()).filter(|o| !o.is_empty()),
            max_items: self.max_items,
            offset: self.offset,
            chunk_size: self.chunk_size,
        }
    }
}

/// Retry policy for the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeouts for the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// Remote store connection settings
///
/// The access token is deliberately absent; it comes from the command line
/// or the environment on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Base URL of the files API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Retry configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            retry: None,
            timeout: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            drive: DriveConfig::default(),
        }
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("gd"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade gd.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, mut config: Config) -> Result<Config> {
        tracing::info!(
            from = config.schema_version,
            to = SCHEMA_VERSION,
            "migrating configuration"
        );
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.defaults.order_by, "name asc,modifiedTime desc");
        assert_eq!(config.defaults.chunk_size, 100);
        assert!(!config.defaults.recurse);
        assert!(config.defaults.max_items.is_none());
        assert_eq!(config.drive.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let mut config = Config::default();
        config.defaults.max_items = Some(50);
        config.defaults.recurse = true;
        config.drive.retry = Some(RetryConfig {
            max_attempts: 5,
            ..RetryConfig::default()
        });

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            r#"
            schema_version = 1

            [defaults]
            chunk_size = 20

            [drive.timeout]
            read_ms = 1000
            "#,
        )
        .unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.defaults.chunk_size, 20);
        assert_eq!(config.defaults.order_by, DEFAULT_ORDER_BY);
        let timeout = config.drive.timeout.unwrap();
        assert_eq!(timeout.read_ms, 1000);
        assert_eq!(timeout.connect_ms, 5000);
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!(
            r#"
            schema_version = {}
            "#,
            SCHEMA_VERSION + 1
        );
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("newer than supported"));
    }

    #[test]
    fn test_older_schema_is_migrated() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(manager.config_path(), "schema_version = 0\n").unwrap();
        assert_eq!(manager.load().unwrap().schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_to_run_params() {
        let defaults = Defaults {
            max_items: Some(3),
            offset: 1,
            ..Defaults::default()
        };
        let params = defaults.to_run_params();
        assert_eq!(params.order_by.as_deref(), Some(DEFAULT_ORDER_BY));
        assert_eq!(params.max_items, Some(3));
        assert_eq!(params.offset, 1);

        let unordered = Defaults {
            order_by: String::new(),
            ..Defaults::default()
        };
        assert!(unordered.to_run_params().order_by.is_none());
    }
}
