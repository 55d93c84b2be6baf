//! Folio Configuration System
//!
//! TOML-backed settings for the application and the file reorganization engine.
//! Each section implements [`ConfigSection`] so it validates and merges itself.
//!
//! - **Graceful degradation**: invalid files are reported and fall back to defaults
//! - **Atomic writes**: config files are never left half-written
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load_or_default();
//! println!("Drain timeout: {:?}", config.reorganize.event_drain_timeout());
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
pub mod app_config;
mod reorganize_config;
mod watcher_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::ConfigManager;
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use reorganize_config::{ReorganizeConfig, DEFAULT_BACKUP_SUFFIX, DEFAULT_FILE_NAMING_PATTERN};
pub use watcher_config::WatcherConfig;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// File reorganization settings
    pub reorganize: ReorganizeConfig,

    /// Filesystem watcher settings
    pub watcher: WatcherConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.reorganize.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.watcher.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.reorganize.merge(other.reorganize);
        self.watcher.merge(other.watcher);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            reorganize: ReorganizeConfig::default(),
            watcher: WatcherConfig::default(),
        }
    }
}
