//! Subscriber-based notifications for connection target swaps.

use parking_lot::RwLock;
use std::sync::Arc;

/// Describes a completed swap of one target's connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapEvent {
    /// Dispatch address of the target.
    pub address: String,
    /// Number of swaps the target has completed, including this one.
    pub generation: u64,
    /// Connections invalidated by this swap.
    pub invalidated: usize,
    /// Whether the invalidated connections were also closed.
    pub force_killed: bool,
}

type Callback = Arc<dyn Fn(&SwapEvent) + Send + Sync>;

/// Internal subscriber registry state.
#[derive(Default)]
struct SubscriberRegistryInner {
    subscribers: Vec<(usize, Callback)>,
    next_id: usize,
}

/// Handle for a subscription that can be dropped to unsubscribe.
pub struct SubscriptionHandle {
    id: usize,
    registry: Arc<RwLock<SubscriberRegistryInner>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let id = self.id;
        self.registry
            .write()
            .subscribers
            .retain(|(sub_id, _)| *sub_id != id);
    }
}

/// Registry of callbacks invoked after every completed swap.
///
/// # Examples
///
/// ```rust
/// use hotload::notify::{SubscriberRegistry, SwapEvent};
///
/// let registry = SubscriberRegistry::new();
/// let handle = registry.subscribe(|event: &SwapEvent| {
///     println!("{} moved (generation {})", event.address, event.generation);
/// });
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// assert_eq!(registry.subscriber_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<SubscriberRegistryInner>>,
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it runs on the swapping target's background task.
    ///
    /// Returns a handle that unsubscribes when dropped.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&SwapEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));

        SubscriptionHandle {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Invoke every subscriber, in subscription order.
    pub fn notify_all(&self, event: &SwapEvent) {
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking.
        let callbacks: Vec<Callback> = self
            .inner
            .read()
            .subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}
