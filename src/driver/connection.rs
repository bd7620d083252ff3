//! Connection wrapper handed out by a target monitor.

use super::Connection;
use crate::core::TargetMonitor;
use crate::error::{BoxError, HotloadError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

/// Shared state of a wrapped connection.
///
/// The monitor keeps one `Arc` in its outstanding set so a swap can invalidate or
/// force-close the connection; the caller's [`HotConnection`] holds the other.
pub(crate) struct TrackedConnection {
    id: u64,
    raw: Box<dyn Connection>,
    connection_string: String,
    scope: CancellationToken,
    invalidated: AtomicBool,
    closed: AtomicBool,
}

impl TrackedConnection {
    pub(crate) fn new(
        id: u64,
        raw: Box<dyn Connection>,
        connection_string: String,
        scope: CancellationToken,
    ) -> Self {
        Self {
            id,
            raw,
            connection_string,
            scope,
            invalidated: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Mark the connection as stale. Only the owning monitor calls this.
    pub(crate) fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    pub(crate) fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the underlying connection exactly once.
    pub(crate) async fn close_raw(&self) -> Result<(), BoxError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.raw.close().await
    }
}

/// A connection opened through a hot-reload target.
///
/// Behaves like the underlying driver's connection. When the target's connection
/// string changes, the connection is invalidated (and closed outright when the
/// target uses `forceKill=true`), which flips [`Connection::is_valid`] to `false`
/// so the owning pool discards it instead of reusing it.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::driver::Connection;
/// use hotload::prelude::*;
///
/// # async fn example(dispatcher: Dispatcher) -> Result<()> {
/// let conn = dispatcher.open("fsnotify://postgres/etc/app/dsn.txt").await?;
/// conn.execute("SELECT 1").await.map_err(HotloadError::Driver)?;
///
/// if !conn.is_valid() {
///     // The target moved; drop this one and open a fresh connection.
/// }
/// conn.close().await.map_err(HotloadError::Driver)?;
/// # Ok(())
/// # }
/// ```
pub struct HotConnection {
    inner: Arc<TrackedConnection>,
    /// Non-owning; only used to drop this connection from the monitor's bookkeeping.
    monitor: Weak<TargetMonitor>,
}

impl HotConnection {
    pub(crate) fn new(inner: Arc<TrackedConnection>, monitor: Weak<TargetMonitor>) -> Self {
        Self { inner, monitor }
    }

    /// Identifier of this connection within its target.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The connection string, with driver options merged in, that opened this connection.
    pub fn connection_string(&self) -> &str {
        &self.inner.connection_string
    }

    /// Whether the target has swapped to a new connection string since this
    /// connection was opened.
    pub fn is_invalidated(&self) -> bool {
        self.inner.is_invalidated()
    }

    /// Whether the underlying connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Scope of the configuration this connection was opened under.
    ///
    /// It is cancelled as soon as the target swaps, so long-running work tied to
    /// the old configuration can bail out.
    pub fn scope(&self) -> &CancellationToken {
        &self.inner.scope
    }

    fn ensure_open(&self) -> Result<(), BoxError> {
        if self.inner.is_closed() {
            return Err(Box::new(HotloadError::ConnectionClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for HotConnection {
    async fn execute(&self, statement: &str) -> Result<u64, BoxError> {
        self.ensure_open()?;
        self.inner.raw.execute(statement).await
    }

    async fn ping(&self) -> Result<(), BoxError> {
        self.ensure_open()?;
        self.inner.raw.ping().await
    }

    async fn close(&self) -> Result<(), BoxError> {
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.forget(self.inner.id).await;
        }
        self.inner.close_raw().await
    }

    fn is_valid(&self) -> bool {
        !self.inner.is_invalidated() && !self.inner.is_closed() && self.inner.raw.is_valid()
    }
}

impl Drop for HotConnection {
    fn drop(&mut self) {
        if self.inner.is_closed() {
            return;
        }
        // Without a runtime the entry lingers until the next swap clears it.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let monitor = self.monitor.clone();
        handle.spawn(async move {
            if let Some(monitor) = monitor.upgrade() {
                monitor.forget(inner.id).await;
            }
            let _ = inner.close_raw().await;
        });
    }
}

impl std::fmt::Debug for HotConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotConnection")
            .field("id", &self.inner.id)
            .field("invalidated", &self.inner.is_invalidated())
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}
