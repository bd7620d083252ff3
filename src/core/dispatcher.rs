//! Routing of dispatch addresses to their target monitors.

use crate::core::monitor::{Observers, TargetMonitor};
use crate::core::{DispatchAddress, DispatcherBuilder, Registry};
use crate::driver::HotConnection;
use crate::error::{HotloadError, Result};
use crate::notify::{SubscriptionHandle, SwapEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Entry point for opening hot-reloadable connections.
///
/// The first `open` of a dispatch address starts watching its source of truth;
/// every later `open` of the exact same address reuses that target.
///
/// All targets live until the dispatcher's scope is cancelled, either through
/// the parent token given to the builder, [`Dispatcher::shutdown`], or by
/// dropping the dispatcher.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::prelude::*;
///
/// # async fn example(registry: std::sync::Arc<Registry>) -> Result<()> {
/// let dispatcher = Dispatcher::new(registry);
/// let conn = dispatcher.open("fsnotify://postgres/etc/app/dsn.txt").await?;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    registry: Arc<Registry>,
    scope: CancellationToken,
    /// Keyed by the full, unparsed dispatch address.
    monitors: Mutex<HashMap<String, Arc<TargetMonitor>>>,
    observers: Observers,
}

impl Dispatcher {
    /// Create a dispatcher over `registry` with default settings.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::builder().with_registry(registry).build()
    }

    /// Create a builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn from_parts(
        registry: Arc<Registry>,
        parent: &CancellationToken,
        observers: Observers,
    ) -> Self {
        Self {
            registry,
            scope: parent.child_token(),
            monitors: Mutex::new(HashMap::new()),
            observers,
        }
    }

    /// Open a connection through the target named by `address`.
    ///
    /// # Errors
    ///
    /// - [`HotloadError::MalformedAddress`] if `address` does not parse
    /// - [`HotloadError::UnsupportedStrategy`] / [`HotloadError::UnknownDriver`]
    ///   if the scheme or host is not registered
    /// - [`HotloadError::WatchFailure`] if the strategy cannot start watching
    /// - [`HotloadError::OptionMergeFailure`] if driver options cannot be merged
    ///   into the current value
    /// - [`HotloadError::Driver`] with the driver's own error
    /// - [`HotloadError::Terminated`] after the dispatcher's scope is cancelled
    pub async fn open(&self, address: &str) -> Result<HotConnection> {
        if self.scope.is_cancelled() {
            return Err(HotloadError::Terminated);
        }
        let parsed = DispatchAddress::parse(address)?;

        let monitor = {
            let mut monitors = self.monitors.lock().await;
            match monitors.get(address) {
                Some(monitor) => Arc::clone(monitor),
                None => {
                    let monitor = self.start_target(&parsed).await?;
                    monitors.insert(address.to_string(), Arc::clone(&monitor));
                    monitor
                }
            }
        };

        monitor.open().await
    }

    async fn start_target(&self, address: &DispatchAddress) -> Result<Arc<TargetMonitor>> {
        let strategy = self
            .registry
            .strategy(address.strategy())
            .ok_or_else(|| HotloadError::UnsupportedStrategy(address.strategy().to_string()))?;
        let driver = self
            .registry
            .driver(address.driver())
            .ok_or_else(|| HotloadError::UnknownDriver(address.driver().to_string()))?;

        let (value, updates) = strategy
            .watch(self.scope.clone(), address.path(), address.params())
            .await
            .map_err(HotloadError::WatchFailure)?;
        debug!(address = %address, "initial connection information received");

        let monitor = TargetMonitor::new(
            address,
            value,
            driver,
            self.scope.clone(),
            self.observers.clone(),
        );
        monitor.start(updates);

        info!(
            address = %address,
            strategy = address.strategy(),
            driver = address.driver(),
            "watching hotload target"
        );
        Ok(monitor)
    }

    /// The registry this dispatcher resolves names against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Register a callback invoked after every completed swap of any target.
    ///
    /// The callback runs on the target's background task; keep it short.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&SwapEvent) + Send + Sync + 'static,
    {
        self.observers.events.subscribe(callback)
    }

    /// Dispatch addresses with a live target, sorted.
    pub async fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.monitors.lock().await.keys().cloned().collect();
        targets.sort();
        targets
    }

    /// The current connection string of a target, before driver options are merged.
    pub async fn current_value(&self, address: &str) -> Option<Arc<String>> {
        let monitor = self.monitors.lock().await.get(address).cloned()?;
        Some(monitor.current_value())
    }

    /// Number of connections opened under a target's current value and not yet closed.
    pub async fn outstanding(&self, address: &str) -> Option<usize> {
        let monitor = self.monitors.lock().await.get(address).cloned()?;
        Some(monitor.outstanding().await)
    }

    /// Stop every target. Later opens fail with [`HotloadError::Terminated`].
    pub fn shutdown(&self) {
        self.scope.cancel();
    }

    /// Whether the dispatcher's scope has been cancelled.
    pub fn is_shutdown(&self) -> bool {
        self.scope.is_cancelled()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("drivers", &self.registry.driver_names())
            .field("strategies", &self.registry.strategy_names())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Connection, Driver};
    use crate::error::BoxError;
    use crate::sources::{ManualStrategy, QueryParams, Strategy, Watched};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoConnection;

    #[async_trait]
    impl Connection for EchoConnection {
        async fn execute(&self, _statement: &str) -> std::result::Result<u64, BoxError> {
            Ok(0)
        }

        async fn close(&self) -> std::result::Result<(), BoxError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingDriver {
        opens: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Driver for CountingDriver {
        async fn open(&self, _: &str) -> std::result::Result<Box<dyn Connection>, BoxError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoConnection))
        }
    }

    async fn setup() -> (Dispatcher, ManualStrategy, CountingDriver) {
        let manual = ManualStrategy::new();
        manual.set("/db", "postgres://db-a/app").await;
        let driver = CountingDriver::default();

        let registry = Arc::new(Registry::new());
        registry.register_strategy("manual", manual.clone());
        registry.register_driver("counting", driver.clone());

        (Dispatcher::new(registry), manual, driver)
    }

    #[tokio::test]
    async fn test_same_address_reuses_target() {
        let (dispatcher, manual, driver) = setup().await;

        let _a = dispatcher.open("manual://counting/db").await.unwrap();
        let _b = dispatcher.open("manual://counting/db").await.unwrap();

        assert_eq!(dispatcher.targets().await, vec!["manual://counting/db".to_string()]);
        assert_eq!(manual.watcher_count("/db"), 1);
        assert_eq!(driver.opens.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.outstanding("manual://counting/db").await, Some(2));
    }

    #[tokio::test]
    async fn test_distinct_addresses_get_distinct_targets() {
        let (dispatcher, manual, _) = setup().await;

        dispatcher.open("manual://counting/db").await.unwrap();
        dispatcher.open("manual://counting/db?forceKill=true").await.unwrap();

        assert_eq!(dispatcher.targets().await.len(), 2);
        assert_eq!(manual.watcher_count("/db"), 2);
    }

    #[tokio::test]
    async fn test_resolution_errors() {
        let (dispatcher, _, _) = setup().await;

        assert!(matches!(
            dispatcher.open("not a url").await,
            Err(HotloadError::MalformedAddress { .. })
        ));
        assert!(matches!(
            dispatcher.open("fsnotify://counting/db").await,
            Err(HotloadError::UnsupportedStrategy(s)) if s == "fsnotify"
        ));
        assert!(matches!(
            dispatcher.open("manual://mysql/db").await,
            Err(HotloadError::UnknownDriver(d)) if d == "mysql"
        ));
        assert!(matches!(
            dispatcher.open("manual://counting/unknown").await,
            Err(HotloadError::WatchFailure(_))
        ));
        assert!(dispatcher.targets().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_watch_is_retried_on_next_open() {
        let (dispatcher, manual, _) = setup().await;

        assert!(dispatcher.open("manual://counting/later").await.is_err());
        manual.set("/later", "postgres://db-c/app").await;
        assert!(dispatcher.open("manual://counting/later").await.is_ok());
    }

    #[tokio::test]
    async fn test_strategy_receives_path_with_leading_slash() {
        let (dispatcher, manual, _) = setup().await;
        manual.set("orders", "postgres://db-a/orders").await;

        assert!(matches!(
            dispatcher.open("manual://counting/orders").await,
            Err(HotloadError::WatchFailure(_))
        ));
        manual.set("/orders", "postgres://db-a/orders").await;
        assert!(dispatcher.open("manual://counting/orders").await.is_ok());
    }

    struct SlowStrategy {
        watches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Strategy for SlowStrategy {
        async fn watch(
            &self,
            _scope: CancellationToken,
            _path: &str,
            _params: &QueryParams,
        ) -> std::result::Result<Watched, BoxError> {
            self.watches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            // A closed stream leaves the target on its initial value.
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(("postgres://db-a/app".to_string(), rx))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_opens_share_one_target() {
        let watches = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(Registry::new());
        registry.register_strategy("slow", SlowStrategy { watches: Arc::clone(&watches) });
        registry.register_driver("counting", CountingDriver::default());
        let dispatcher = Arc::new(Dispatcher::new(registry));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.push(tokio::spawn(async move {
                dispatcher.open("slow://counting/db").await.map(|conn| conn.id())
            }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap().unwrap());
        }

        assert_eq!(watches.load(Ordering::SeqCst), 1);
        assert_eq!(ids.len(), 32);
        assert_eq!(dispatcher.targets().await.len(), 1);
    }

    #[tokio::test]
    async fn test_current_value_tracks_swaps() {
        let (dispatcher, manual, _) = setup().await;
        assert!(dispatcher.current_value("manual://counting/db").await.is_none());

        dispatcher.open("manual://counting/db").await.unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _handle = dispatcher.subscribe(move |event| {
            let _ = tx.send(event.generation);
        });

        manual.set("/db", "postgres://db-b/app").await;
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(
            dispatcher.current_value("manual://counting/db").await.as_deref().map(String::as_str),
            Some("postgres://db-b/app")
        );
    }

    #[tokio::test]
    async fn test_shutdown_terminates() {
        let (dispatcher, _, _) = setup().await;
        let conn = dispatcher.open("manual://counting/db").await.unwrap();

        dispatcher.shutdown();
        assert!(dispatcher.is_shutdown());
        assert!(matches!(
            dispatcher.open("manual://counting/db").await,
            Err(HotloadError::Terminated)
        ));
        conn.scope().cancelled().await;
    }

    #[tokio::test]
    async fn test_parent_token_cancels_dispatcher() {
        let parent = CancellationToken::new();
        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::builder()
            .with_registry(registry)
            .with_parent_token(parent.clone())
            .build();

        parent.cancel();
        assert!(dispatcher.is_shutdown());
    }
}
