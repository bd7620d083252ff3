//! Settings loader that merges files and environment overrides.

use crate::core::HotloadSettings;
use crate::error::{HotloadError, Result};
use config::{Environment, File};
use std::path::PathBuf;

/// Loads [`HotloadSettings`] from files and environment variables.
///
/// Files are merged in the order they were added (later files override earlier
/// ones); environment variables override all files. Missing keys fall back to the
/// defaults.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::core::SettingsLoader;
///
/// # fn example() -> hotload::error::Result<()> {
/// // HOTLOAD__FILE_WATCH__DEBOUNCE_MS=250 -> file_watch.debounce_ms = 250
/// let settings = SettingsLoader::new()
///     .with_file("config/hotload.yaml")
///     .with_env_overrides("HOTLOAD", "__")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SettingsLoader {
    files: Vec<PathBuf>,
    env: Option<(String, String)>,
}

impl SettingsLoader {
    /// Create a loader with no sources; `load` then returns the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a settings file (YAML, TOML or JSON, detected by extension).
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Read overrides from environment variables.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "HOTLOAD")
    /// * `separator` - Separator for nested keys (e.g., "__")
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env = Some((prefix.to_string(), separator.to_string()));
        self
    }

    /// Load and merge the settings.
    ///
    /// # Errors
    ///
    /// Returns [`HotloadError::Settings`] if a file is missing or unreadable or a
    /// value has the wrong type.
    pub fn load(&self) -> Result<HotloadSettings> {
        let mut builder = config::Config::builder();

        for path in &self.files {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }

        if let Some((prefix, separator)) = &self.env {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator(separator)
                    .separator(separator)
                    .try_parsing(true),
            );
        }

        let config = builder.build().map_err(|e| {
            HotloadError::Settings(format!("Failed to build settings: {}", e))
        })?;

        config.try_deserialize::<HotloadSettings>().map_err(|e| {
            HotloadError::Settings(format!("Failed to deserialize settings: {}", e))
        })
    }

    /// Files in merge order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}
