//! Driver and strategy registries.

use crate::driver::Driver;
use crate::error::RegistryError;
use crate::sources::Strategy;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A registered underlying driver plus the options merged into every
/// connection string it is asked to open.
pub struct DriverEntry {
    name: String,
    driver: Arc<dyn Driver>,
    options: BTreeMap<String, String>,
}

impl DriverEntry {
    /// Name the driver was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying driver.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Default connection-string options.
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }
}

impl std::fmt::Debug for DriverEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverEntry")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    drivers: HashMap<String, Arc<DriverEntry>>,
    strategies: HashMap<String, Arc<dyn Strategy>>,
}

/// Registry of underlying drivers and watch strategies.
///
/// Entries are immutable once registered and the registry only grows. Each
/// dispatcher reads from one registry; tests can build isolated ones.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::core::Registry;
/// use hotload::sources::ManualStrategy;
/// # use hotload::driver::{Connection, Driver};
/// # use hotload::error::BoxError;
/// # struct PgDriver;
/// # #[async_trait::async_trait]
/// # impl Driver for PgDriver {
/// #     async fn open(&self, _: &str) -> Result<Box<dyn Connection>, BoxError> {
/// #         unimplemented!()
/// #     }
/// # }
///
/// let registry = Registry::new();
/// registry.register_driver_with_options("postgres", PgDriver, [("sslmode", "require")]);
/// registry.register_strategy("manual", ManualStrategy::new());
///
/// assert_eq!(registry.driver_names(), vec!["postgres"]);
/// ```
#[derive(Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or already registered. Both are wiring mistakes
    /// that must not survive startup.
    pub fn register_driver<D: Driver + 'static>(&self, name: &str, driver: D) {
        if let Err(err) = self.try_register_driver(name, Arc::new(driver), BTreeMap::new()) {
            panic!("{}", err);
        }
    }

    /// Register a driver with default connection-string options.
    ///
    /// The options are merged into the query of every connection string opened
    /// through this driver, so the driver must accept URI-style connection strings.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or already registered.
    pub fn register_driver_with_options<D, I, K, V>(&self, name: &str, driver: D, options: I)
    where
        D: Driver + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let options = options
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if let Err(err) = self.try_register_driver(name, Arc::new(driver), options) {
            panic!("{}", err);
        }
    }

    /// Register a driver, reporting a rejected registration instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if `name` is empty or already registered.
    pub fn try_register_driver(
        &self,
        name: &str,
        driver: Arc<dyn Driver>,
        options: BTreeMap<String, String>,
    ) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName { kind: "driver" });
        }

        let mut inner = self.inner.write();
        if inner.drivers.contains_key(name) {
            return Err(RegistryError::Duplicate {
                kind: "driver",
                name: name.to_string(),
            });
        }
        inner.drivers.insert(
            name.to_string(),
            Arc::new(DriverEntry {
                name: name.to_string(),
                driver,
                options,
            }),
        );
        Ok(())
    }

    /// Register a watch strategy under the scheme `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or already registered.
    pub fn register_strategy<S: Strategy + 'static>(&self, name: &str, strategy: S) {
        if let Err(err) = self.try_register_strategy(name, Arc::new(strategy)) {
            panic!("{}", err);
        }
    }

    /// Register a strategy, reporting a rejected registration instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if `name` is empty or already registered.
    pub fn try_register_strategy(
        &self,
        name: &str,
        strategy: Arc<dyn Strategy>,
    ) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName { kind: "strategy" });
        }

        let mut inner = self.inner.write();
        if inner.strategies.contains_key(name) {
            return Err(RegistryError::Duplicate {
                kind: "strategy",
                name: name.to_string(),
            });
        }
        inner.strategies.insert(name.to_string(), strategy);
        Ok(())
    }

    /// Sorted names of the registered drivers.
    pub fn driver_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().drivers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Sorted names of the registered strategies.
    pub fn strategy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().strategies.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up a driver entry.
    pub fn driver(&self, name: &str) -> Option<Arc<DriverEntry>> {
        self.inner.read().drivers.get(name).cloned()
    }

    /// Look up a strategy.
    pub fn strategy(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.inner.read().strategies.get(name).cloned()
    }

    /// Drop every registration. For tests only.
    #[doc(hidden)]
    pub fn unregister_all(&self) {
        let mut inner = self.inner.write();
        inner.drivers.clear();
        inner.strategies.clear();
    }
}
