//! Programmatically driven strategy.

use super::{QueryParams, Strategy, Watched};
use crate::error::BoxError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct Slot {
    value: String,
    watchers: Vec<mpsc::Sender<String>>,
}

/// Strategy whose values are set from code.
///
/// Useful when the source of truth is something hotload has no built-in support
/// for (a key-value store client, a secrets SDK): the integration calls
/// [`ManualStrategy::set`] whenever it observes a new connection string.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::sources::ManualStrategy;
///
/// # async fn example() {
/// let strategy = ManualStrategy::new();
/// strategy.set("/orders", "postgres://orders@db-a/orders").await;
///
/// // Later, after a failover
/// strategy.set("/orders", "postgres://orders@db-b/orders").await;
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ManualStrategy {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl ManualStrategy {
    /// Create an empty strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `path` and push it to every live watcher of that path.
    pub async fn set(&self, path: &str, value: impl Into<String>) {
        let value = value.into();
        let watchers = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(path.to_string()).or_default();
            slot.value = value.clone();
            slot.watchers.retain(|tx| !tx.is_closed());
            slot.watchers.clone()
        };

        for tx in watchers {
            let _ = tx.send(value.clone()).await;
        }
    }

    /// Current value stored for `path`.
    pub fn get(&self, path: &str) -> Option<String> {
        self.slots.lock().get(path).map(|slot| slot.value.clone())
    }

    /// Number of live watchers of `path`.
    pub fn watcher_count(&self, path: &str) -> usize {
        self.slots
            .lock()
            .get(path)
            .map(|slot| slot.watchers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Strategy for ManualStrategy {
    async fn watch(
        &self,
        _scope: CancellationToken,
        path: &str,
        _params: &QueryParams,
    ) -> Result<Watched, BoxError> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(path)
            .ok_or_else(|| format!("no value set for path {}", path))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        slot.watchers.push(tx);
        Ok((slot.value.clone(), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watch_unknown_path_fails() {
        let strategy = ManualStrategy::new();
        let result = strategy
            .watch(CancellationToken::new(), "/missing", &QueryParams::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_watch_returns_current_value() {
        let strategy = ManualStrategy::new();
        strategy.set("/db", "host=a").await;

        let (value, _rx) = strategy
            .watch(CancellationToken::new(), "/db", &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(value, "host=a");
    }

    #[tokio::test]
    async fn test_set_pushes_to_watchers() {
        let strategy = ManualStrategy::new();
        strategy.set("/db", "host=a").await;

        let (_, mut rx1) = strategy
            .watch(CancellationToken::new(), "/db", &QueryParams::new())
            .await
            .unwrap();
        let (_, mut rx2) = strategy
            .watch(CancellationToken::new(), "/db", &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(strategy.watcher_count("/db"), 2);

        strategy.set("/db", "host=b").await;
        assert_eq!(rx1.recv().await.as_deref(), Some("host=b"));
        assert_eq!(rx2.recv().await.as_deref(), Some("host=b"));
        assert_eq!(strategy.get("/db").as_deref(), Some("host=b"));
    }

    #[tokio::test]
    async fn test_dropped_watchers_are_pruned() {
        let strategy = ManualStrategy::new();
        strategy.set("/db", "host=a").await;

        let (_, rx) = strategy
            .watch(CancellationToken::new(), "/db", &QueryParams::new())
            .await
            .unwrap();
        drop(rx);

        strategy.set("/db", "host=b").await;
        assert_eq!(strategy.watcher_count("/db"), 0);
    }

    #[tokio::test]
    async fn test_paths_are_independent() {
        let strategy = ManualStrategy::new();
        strategy.set("/a", "host=a").await;
        strategy.set("/b", "host=b").await;

        let (_, mut rx_a) = strategy
            .watch(CancellationToken::new(), "/a", &QueryParams::new())
            .await
            .unwrap();

        strategy.set("/b", "host=c").await;
        assert!(rx_a.try_recv().is_err());
    }
}
