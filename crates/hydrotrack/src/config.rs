//! Configuration management for hydrotrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::DEFAULT_QUEUE_CAPACITY;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "hydrotrack";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "tracker.db";

/// Default inbox directory name (inside the data directory).
const INBOX_DIR_NAME: &str = "inbox";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `HYDROTRACK_`, `__` between
///    section and key, e.g. `HYDROTRACK_STORAGE__DATABASE_PATH`)
/// 2. TOML config file at `~/.config/hydrotrack/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Replication configuration.
    pub replication: ReplicationConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/hydrotrack/tracker.db`
    pub database_path: Option<PathBuf>,
}

/// Paired-device replication configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Enable replication to a paired device.
    pub enabled: bool,
    /// Directory this device receives snapshots in.
    /// Defaults to `~/.local/share/hydrotrack/inbox`
    pub inbox_dir: Option<PathBuf>,
    /// Inbox directory of the paired device. Unset means nothing is paired.
    pub peer_inbox_dir: Option<PathBuf>,
    /// Interval between inbox sweeps in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of inbound snapshots that may wait for the tracker.
    pub queue_capacity: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inbox_dir: None,
            peer_inbox_dir: None,
            poll_interval_ms: 1000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("HYDROTRACK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.replication.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "poll_interval_ms must be greater than 0".to_string(),
            });
        }

        if self.replication.queue_capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "queue_capacity must be greater than 0".to_string(),
            });
        }

        if let Some(peer) = &self.replication.peer_inbox_dir {
            if *peer == self.inbox_dir() {
                return Err(Error::ConfigValidation {
                    message: format!(
                        "peer_inbox_dir ({}) cannot be the same as inbox_dir",
                        peer.display()
                    ),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the local inbox path, resolving defaults if not set.
    #[must_use]
    pub fn inbox_dir(&self) -> PathBuf {
        self.replication
            .inbox_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(INBOX_DIR_NAME))
    }

    /// Whether a paired device is configured and replication is on.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.replication.enabled && self.replication.peer_inbox_dir.is_some()
    }

    /// Get the inbox poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.replication.poll_interval_ms)
    }
}
