//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult, LogLevel};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "FOLIO";

/// Main configuration manager
///
/// Owns the config file location and wraps loading, saving and validation.
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new config manager using the platform config directory
    ///
    /// - Linux: `~/.config/folio/`
    /// - macOS: `~/Library/Application Support/folio/`
    /// - Windows: `%APPDATA%\folio\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    /// Creates a config manager with a custom config directory
    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        let config_path = config_dir.join("config.toml");
        let persistence = ConfigPersistence::new(config_path);

        Ok(Self {
            persistence,
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "folio")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            })
    }

    /// Returns the config directory path
    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    /// Returns the full config file path
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Loads the configuration from file
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Saves the configuration to file after validating it
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads the config, applies `update_fn` and saves the result
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use folio_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.reorganize.settle_delay_ms = 1000;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default config file if none exists
    ///
    /// Returns `Ok(true)` when a file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path().display());
        Ok(true)
    }

    /// Overwrites the config file with default values
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Validates the current configuration file, returning every problem found
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the config and applies `FOLIO_SECTION_FIELD` environment overrides
    ///
    /// Example: `FOLIO_REORGANIZE_SETTLE_DELAY_MS=0`
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config invalid after env overrides: {}",
                crate::error::join_errors(&errors)
            );
        }

        Ok(config)
    }
}

fn env_key(section: &str, field: &str) -> String {
    format!("{}_{}_{}", ENV_PREFIX, section, field)
}

/// Applies overrides found through `lookup` onto `config`
///
/// Values that fail to parse are logged and ignored.
pub(crate) fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parse_into<T: std::str::FromStr>(key: &str, raw: String, slot: &mut T) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => log::warn!("Ignoring unparseable override {}={}", key, raw),
        }
    }

    let key = env_key("APP", "DATABASE_PATH");
    if let Some(path) = lookup(&key) {
        config.app.database_path = PathBuf::from(path);
    }

    let key = env_key("APP", "LOG_LEVEL");
    if let Some(raw) = lookup(&key) {
        parse_into::<LogLevel>(&key, raw, &mut config.app.log_level);
    }

    let key = env_key("REORGANIZE", "EVENT_DRAIN_TIMEOUT_MS");
    if let Some(raw) = lookup(&key) {
        parse_into(&key, raw, &mut config.reorganize.event_drain_timeout_ms);
    }

    let key = env_key("REORGANIZE", "SETTLE_DELAY_MS");
    if let Some(raw) = lookup(&key) {
        parse_into(&key, raw, &mut config.reorganize.settle_delay_ms);
    }

    let key = env_key("REORGANIZE", "DEFAULT_FILE_NAMING_PATTERN");
    if let Some(pattern) = lookup(&key) {
        config.reorganize.default_file_naming_pattern = pattern;
    }
}
