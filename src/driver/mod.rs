//! Underlying driver capabilities and the hot-swappable connection wrapper.
//!
//! hotload never speaks a database protocol itself. A real driver is plugged in
//! through [`Driver`], and every connection it hands out is wrapped in a
//! [`HotConnection`] so the owning target can retire it when the connection
//! string changes.

mod connection;

pub use connection::HotConnection;
pub(crate) use connection::TrackedConnection;

use crate::error::BoxError;
use async_trait::async_trait;

/// A database driver that can open connections from a connection string.
///
/// Implement this for the real driver you want hotload to redirect.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use hotload::driver::{Connection, Driver};
/// use hotload::error::BoxError;
///
/// struct NullConnection;
///
/// #[async_trait]
/// impl Connection for NullConnection {
///     async fn execute(&self, _statement: &str) -> Result<u64, BoxError> {
///         Ok(0)
///     }
///
///     async fn close(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// struct NullDriver;
///
/// #[async_trait]
/// impl Driver for NullDriver {
///     async fn open(&self, _connection_string: &str) -> Result<Box<dyn Connection>, BoxError> {
///         Ok(Box::new(NullConnection))
///     }
/// }
/// ```
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new connection for the given connection string.
    ///
    /// # Errors
    ///
    /// Any error is handed back to the caller of the dispatcher unchanged.
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>, BoxError>;
}

/// A live database connection.
///
/// hotload does not interpret statements; they are forwarded to the driver as-is.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, statement: &str) -> Result<u64, BoxError>;

    /// Check that the connection is still alive.
    async fn ping(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Close the connection.
    async fn close(&self) -> Result<(), BoxError>;

    /// Whether a pool may hand this connection out again.
    ///
    /// Pools should call this on release and discard the connection when it
    /// returns `false`.
    fn is_valid(&self) -> bool {
        true
    }
}
