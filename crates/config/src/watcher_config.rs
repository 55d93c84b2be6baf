//! Filesystem watcher settings

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatcherConfig {
    /// Capacity of the channel carrying events to consumers
    pub event_channel_capacity: usize,

    /// How often pending-event counters are checked while draining
    pub drain_poll_interval_ms: u64,
}

impl WatcherConfig {
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 256,
            drain_poll_interval_ms: 25,
        }
    }
}

impl ConfigSection for WatcherConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let results = vec![
            Validator::in_range(
                self.event_channel_capacity,
                1,
                65_536,
                "watcher.event_channel_capacity",
            ),
            Validator::in_range(
                self.drain_poll_interval_ms,
                1,
                1_000,
                "watcher.drain_poll_interval_ms",
            ),
        ];

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.event_channel_capacity = other.event_channel_capacity;
        self.drain_poll_interval_ms = other.drain_poll_interval_ms;
    }

    fn section_name(&self) -> &'static str {
        "watcher"
    }
}
