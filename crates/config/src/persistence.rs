//! File system persistence for configuration
//!
//! Writes go through a temp file and an atomic rename, with the previous
//! file kept as `config.toml.backup`.

use crate::error::join_errors;
use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Reads and writes one config file
pub struct ConfigPersistence {
    config_path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Loads configuration from file
    ///
    /// A missing file yields the default config. An empty or unparseable
    /// file is an error; out-of-range values are only logged.
    pub fn load(&self) -> ConfigResult<Config> {
        let Some(contents) = self.read_contents()? else {
            log::info!(
                "Config file not found at {}, using defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        };

        let mut config: Config =
            toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: self.config_path.clone(),
                source,
            })?;

        if config.version != CONFIG_VERSION {
            log::warn!(
                "Config version {} differs from supported version {}, treating as current",
                config.version,
                CONFIG_VERSION
            );
            config.version = CONFIG_VERSION;
        }
        if let Err(errors) = config.validate() {
            log::warn!("Config has invalid values: {}", join_errors(&errors));
        }

        Ok(config)
    }

    /// Validates `config` and replaces the file with it in one rename
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        let serialized = toml::to_string_pretty(config)?;

        let dir = self.parent_dir()?;
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::DirectoryCreationError {
                path: dir.to_path_buf(),
                source,
            })?;
            log::info!("Created config directory: {}", dir.display());
        }

        if self.config_path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.config_path, &backup)
                .map_err(|source| self.write_error(&backup, source))?;
            log::debug!("Backed up config to {}", backup.display());
        }

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.write_error(dir, e))?;
        temp.write_all(serialized.as_bytes())
            .and_then(|()| temp.flush())
            .map_err(|e| self.write_error(temp.path(), e))?;
        temp.persist(&self.config_path)
            .map_err(|e| self.write_error(&self.config_path, e.error))?;

        log::info!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    /// Path of the copy taken before each overwrite
    pub fn backup_path(&self) -> PathBuf {
        self.config_path.with_extension("toml.backup")
    }

    /// File contents, or `None` if there is no file yet
    fn read_contents(&self) -> ConfigResult<Option<String>> {
        if !self.config_path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&self.config_path).map_err(|source| ConfigError::ReadError {
                path: self.config_path.clone(),
                source,
            })?;
        if contents.trim().is_empty() {
            return Err(ConfigError::EmptyFile {
                path: self.config_path.clone(),
            });
        }
        Ok(Some(contents))
    }

    fn parent_dir(&self) -> ConfigResult<&Path> {
        match self.config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => Ok(dir),
            Some(_) => Ok(Path::new(".")),
            None => Err(ConfigError::PathResolutionError {
                reason: "Config path has no parent directory".to_string(),
            }),
        }
    }

    fn write_error(&self, path: &Path, source: std::io::Error) -> ConfigError {
        ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");
        (temp_dir, config_path)
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let config = persistence.load().expect("Should load default config");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let mut config = Config::default();
        config.reorganize.event_drain_timeout_ms = 1500;
        config.reorganize.default_file_naming_pattern = "{authors}/{title}".to_string();

        persistence.save(&config).expect("Should save config");
        let loaded = persistence.load().expect("Should load config");

        assert_eq!(loaded.reorganize.event_drain_timeout_ms, 1500);
        assert_eq!(loaded.reorganize.default_file_naming_pattern, "{authors}/{title}");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "[reorganize]\nsettle_delay_ms = 0\n").unwrap();

        let loaded = ConfigPersistence::new(config_path).load().unwrap();
        assert_eq!(loaded.reorganize.settle_delay_ms, 0);
        assert_eq!(loaded.reorganize.event_drain_timeout_ms, 500);
        assert_eq!(loaded.watcher, crate::WatcherConfig::default());
    }

    #[test]
    fn test_save_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("subdir").join("config.toml");
        let persistence = ConfigPersistence::new(config_path.clone());

        persistence
            .save(&Config::default())
            .expect("Should create directory and save");

        assert!(config_path.exists());
    }

    #[test]
    fn test_backup_created_on_overwrite() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let config = Config::default();
        persistence.save(&config).expect("Should save config");
        persistence.save(&config).expect("Should save config again");

        assert!(persistence.backup_path().exists());
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "this is not valid TOML {{{").expect("Should write file");

        let result = ConfigPersistence::new(config_path).load();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "   \n").unwrap();

        let result = ConfigPersistence::new(config_path).load();
        assert!(matches!(result, Err(ConfigError::EmptyFile { .. })));
    }

    #[test]
    fn test_validate_before_save() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let mut config = Config::default();
        config.reorganize.backup_suffix = "no-dot".to_string();

        let result = persistence.save(&config);
        assert!(matches!(result, Err(ConfigError::Invalid(ref errors)) if errors.len() == 1));
        assert!(!persistence.backup_path().exists());
    }
}
