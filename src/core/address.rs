//! Dispatch address parsing.

use crate::error::{HotloadError, Result};
use crate::sources::QueryParams;
use std::collections::BTreeMap;
use std::str::FromStr;
use url::Url;

/// Query parameter that makes a target close stale connections on swap.
pub const FORCE_KILL: &str = "forceKill";

/// A parsed dispatch address: `<strategy>://<driver><path>?<query>`.
///
/// # Examples
///
/// ```rust
/// use hotload::core::DispatchAddress;
///
/// let address: DispatchAddress =
///     "fsnotify://postgres/etc/app/dsn.txt?forceKill=true&sslmode=disable".parse().unwrap();
///
/// assert_eq!(address.strategy(), "fsnotify");
/// assert_eq!(address.driver(), "postgres");
/// assert_eq!(address.path(), "/etc/app/dsn.txt");
/// assert!(address.force_kill());
/// assert_eq!(address.driver_options().get("sslmode").map(String::as_str), Some("disable"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAddress {
    raw: String,
    strategy: String,
    driver: String,
    path: String,
    params: QueryParams,
}

impl DispatchAddress {
    /// Parse a dispatch address.
    ///
    /// # Errors
    ///
    /// Returns [`HotloadError::MalformedAddress`] if the input is not a URI.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| HotloadError::MalformedAddress {
            address: raw.to_string(),
            reason: e.to_string(),
        })?;

        let mut params = QueryParams::new();
        for (key, value) in url.query_pairs() {
            params
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }

        Ok(Self {
            raw: raw.to_string(),
            strategy: url.scheme().to_string(),
            driver: url.host_str().unwrap_or_default().to_string(),
            path: url.path().to_string(),
            params,
        })
    }

    /// The address exactly as given; targets are keyed on it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Scheme, naming the watch strategy.
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Authority, naming the registered driver.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Strategy-specific path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All query parameters.
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Whether `forceKill=true` was given. Only the first value counts.
    pub fn force_kill(&self) -> bool {
        self.params
            .get(FORCE_KILL)
            .and_then(|values| values.first())
            .is_some_and(|value| value == "true")
    }

    /// Query parameters forwarded to the driver's connection string.
    ///
    /// Every parameter except the ones hotload itself understands, first value wins.
    pub fn driver_options(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .filter(|(key, _)| key.as_str() != FORCE_KILL)
            .filter_map(|(key, values)| values.first().map(|v| (key.clone(), v.clone())))
            .collect()
    }
}

impl FromStr for DispatchAddress {
    type Err = HotloadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for DispatchAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
