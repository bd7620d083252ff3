//! Watch strategy trait.

use crate::error::BoxError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Query parameters of a dispatch address, as handed to a strategy.
pub type QueryParams = BTreeMap<String, Vec<String>>;

/// Initial value of a watched resource plus the stream of later values.
pub type Watched = (String, mpsc::Receiver<String>);

/// Trait for watch strategies.
///
/// A strategy is the source of truth for a connection string: a file, a key in a
/// key-value store, a secret manager entry. It is selected by the scheme of the
/// dispatch address (`fsnotify://postgres/etc/app/dsn.txt` selects the strategy
/// registered as `fsnotify`).
///
/// Implementations must deliver the full new value on every change, never a
/// diff. Delivering an unchanged value is harmless; the receiving target
/// ignores it. The stream is expected to stay open while `scope` is live.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Start watching `path` and return its current value and an update stream.
    ///
    /// `scope` is cancelled when the dispatcher shuts down; background work
    /// feeding the stream should stop then.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial value cannot be read. No target is
    /// created in that case.
    async fn watch(
        &self,
        scope: CancellationToken,
        path: &str,
        params: &QueryParams,
    ) -> Result<Watched, BoxError>;
}
