//! File reorganization settings

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pattern used when a library has none of its own
pub const DEFAULT_FILE_NAMING_PATTERN: &str = "{authors}/<{series}/><{seriesIndex}. >{title}";

/// Suffix appended to a file while it is parked during a bulk move
pub const DEFAULT_BACKUP_SUFFIX: &str = ".folio-move.tmp";

const MAX_DELAY_MS: u64 = 60_000;

/// Settings for the move orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReorganizeConfig {
    /// Naming pattern applied to libraries without their own
    pub default_file_naming_pattern: String,

    /// Upper bound on waiting for queued watcher events before a bulk move
    pub event_drain_timeout_ms: u64,

    /// Pause after a bulk move before watchers are re-registered
    pub settle_delay_ms: u64,

    /// Suffix for temporary names used while a move is in flight
    pub backup_suffix: String,
}

impl ReorganizeConfig {
    pub fn event_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.event_drain_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for ReorganizeConfig {
    fn default() -> Self {
        Self {
            default_file_naming_pattern: DEFAULT_FILE_NAMING_PATTERN.to_string(),
            event_drain_timeout_ms: 500,
            settle_delay_ms: 500,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }
}

impl ConfigSection for ReorganizeConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let results = vec![
            Validator::not_empty(
                &self.default_file_naming_pattern,
                "reorganize.default_file_naming_pattern",
            ),
            Validator::in_range(
                self.event_drain_timeout_ms,
                0,
                MAX_DELAY_MS,
                "reorganize.event_drain_timeout_ms",
            ),
            Validator::in_range(
                self.settle_delay_ms,
                0,
                MAX_DELAY_MS,
                "reorganize.settle_delay_ms",
            ),
            Validator::prefixed(&self.backup_suffix, ".", "reorganize.backup_suffix"),
            Validator::no_chars(&self.backup_suffix, &['/', '\\'], "reorganize.backup_suffix"),
        ];

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.default_file_naming_pattern = other.default_file_naming_pattern;
        self.event_drain_timeout_ms = other.event_drain_timeout_ms;
        self.settle_delay_ms = other.settle_delay_ms;
        self.backup_suffix = other.backup_suffix;
    }

    fn section_name(&self) -> &'static str {
        "reorganize"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReorganizeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.event_drain_timeout(), Duration::from_millis(500));
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.backup_suffix, ".folio-move.tmp");
    }

    #[test]
    fn test_zero_delays_are_allowed() {
        let config = ReorganizeConfig {
            event_drain_timeout_ms: 0,
            settle_delay_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_delay_out_of_range() {
        let config = ReorganizeConfig {
            settle_delay_ms: MAX_DELAY_MS + 1,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "reorganize.settle_delay_ms");
    }

    #[test]
    fn test_backup_suffix_rules() {
        for bad in ["tmp", ".", ".a/b"] {
            let config = ReorganizeConfig {
                backup_suffix: bad.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_blank_pattern_rejected() {
        let config = ReorganizeConfig {
            default_file_naming_pattern: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
