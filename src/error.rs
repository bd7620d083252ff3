//! Error types for hotload.

/// Boxed error used at the driver and strategy seams.
///
/// Underlying drivers and watch strategies report failures through this type so
/// that their original error value reaches the caller untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for hotload operations.
pub type Result<T> = std::result::Result<T, HotloadError>;

/// Errors that can occur when dispatching or using hot-swapped connections.
#[derive(Debug, thiserror::Error)]
pub enum HotloadError {
    /// The dispatch address names a scheme with no registered strategy.
    #[error("Unsupported hotload strategy: {0}")]
    UnsupportedStrategy(String),

    /// The dispatch address names a driver that was never registered.
    #[error("Target driver is not registered with hotload: {0}")]
    UnknownDriver(String),

    /// The dispatch address is not a URI.
    #[error("Malformed hotload connection string '{address}': {reason}")]
    MalformedAddress {
        /// The address as given by the caller
        address: String,
        /// Why it failed to parse
        reason: String,
    },

    /// The watch strategy failed to produce an initial value.
    #[error("Watch failed: {0}")]
    WatchFailure(#[source] BoxError),

    /// The current connection string could not absorb the extra driver options.
    #[error("Unable to merge driver options into connection string: {0}")]
    OptionMergeFailure(String),

    /// Error returned by the underlying driver, passed through verbatim.
    #[error(transparent)]
    Driver(BoxError),

    /// The connection was already closed, either by its holder or by a force-kill swap.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// The dispatcher's scope has been cancelled; no further targets can be opened.
    #[error("Hotload dispatcher has been shut down")]
    Terminated,

    /// Failed to load hotload settings.
    #[error("Failed to load settings: {0}")]
    Settings(String),
}

impl HotloadError {
    /// Returns the underlying driver error, if this is one.
    pub fn driver_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Driver(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Rejected registration of a driver or strategy.
///
/// The panicking `register_*` calls turn these into a fatal startup error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The registration name was empty.
    #[error("hotload: cannot register a {kind} under an empty name")]
    EmptyName {
        /// "driver" or "strategy"
        kind: &'static str,
    },

    /// The name was already taken.
    #[error("hotload: register called twice for {kind} {name}")]
    Duplicate {
        /// "driver" or "strategy"
        kind: &'static str,
        /// The duplicated name
        name: String,
    },
}
