//! Builder for constructing Dispatcher instances.

use crate::core::monitor::Observers;
use crate::core::{Dispatcher, HotloadSettings, Registry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "file-watch")]
use crate::sources::FileStrategy;

#[cfg(feature = "metrics")]
use crate::metrics::HotloadMetrics;

/// Builder for constructing a [`Dispatcher`].
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::prelude::*;
/// use tokio_util::sync::CancellationToken;
///
/// # fn example(registry: std::sync::Arc<Registry>) -> Result<()> {
/// let shutdown = CancellationToken::new();
/// let settings = SettingsLoader::new()
///     .with_file("config/hotload.yaml")
///     .with_env_overrides("HOTLOAD", "__")
///     .load()?;
///
/// let dispatcher = Dispatcher::builder()
///     .with_registry(registry)
///     .with_parent_token(shutdown.clone())
///     .with_settings(settings)
///     .with_file_strategy("fsnotify")
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct DispatcherBuilder {
    registry: Option<Arc<Registry>>,
    parent: Option<CancellationToken>,
    #[cfg_attr(not(feature = "file-watch"), allow(dead_code))]
    settings: HotloadSettings,
    #[cfg(feature = "file-watch")]
    file_strategy: Option<String>,
    #[cfg(feature = "metrics")]
    metrics: Option<HotloadMetrics>,
}

impl DispatcherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve strategies and drivers against `registry`.
    ///
    /// Without one the dispatcher gets a fresh, empty registry.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Tie the dispatcher's lifetime to `parent`.
    ///
    /// Cancelling `parent` stops every target, as does dropping the dispatcher.
    pub fn with_parent_token(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Use `settings` for built-in strategies.
    pub fn with_settings(mut self, settings: HotloadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Register the built-in file strategy under `scheme` when building.
    ///
    /// # Panics
    ///
    /// [`build`](Self::build) panics if `scheme` is empty or already registered.
    #[cfg(feature = "file-watch")]
    pub fn with_file_strategy(mut self, scheme: &str) -> Self {
        self.file_strategy = Some(scheme.to_string());
        self
    }

    /// Record swap and connection metrics with `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(HotloadMetrics::new(meter));
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> Dispatcher {
        let registry = self.registry.unwrap_or_default();

        #[cfg(feature = "file-watch")]
        if let Some(scheme) = &self.file_strategy {
            registry.register_strategy(scheme, FileStrategy::new(self.settings.file_watch.clone()));
        }

        let observers = Observers {
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
            ..Observers::default()
        };

        let parent = self.parent.unwrap_or_default();
        Dispatcher::from_parts(registry, &parent, observers)
    }
}
