//! Tunable settings.

use serde::Deserialize;
use std::time::Duration;

/// Top-level hotload settings.
///
/// Every field has a default, so an empty source yields a usable value.
///
/// ```yaml
/// file_watch:
///   debounce_ms: 250
///   channel_capacity: 32
///   poll_interval_ms: 1000
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HotloadSettings {
    /// Settings for the built-in file strategy.
    pub file_watch: FileWatchSettings,
}

/// Settings for the built-in file strategy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileWatchSettings {
    /// Minimum time between two change notifications for one file.
    pub debounce_ms: u64,
    /// Capacity of each update stream.
    pub channel_capacity: usize,
    /// Also poll the file's modification time at this interval.
    ///
    /// Filesystem notifications are unreliable on some mounts (network shares,
    /// projected volumes); polling catches what they miss.
    pub poll_interval_ms: Option<u64>,
    /// Strip leading and trailing whitespace from file contents.
    pub trim: bool,
}

impl FileWatchSettings {
    /// Debounce window as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Poll interval as a duration, if polling is enabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Default for FileWatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            channel_capacity: 16,
            poll_interval_ms: None,
            trim: true,
        }
    }
}
