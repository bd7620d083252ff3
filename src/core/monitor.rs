//! Per-target monitor: owns the live connection string and the connections
//! opened from it.

use crate::core::DispatchAddress;
use crate::core::options::{layer_options, merge_connection_options};
use crate::core::registry::DriverEntry;
use crate::driver::{HotConnection, TrackedConnection};
use crate::error::{HotloadError, Result};
use crate::notify::{SubscriberRegistry, SwapEvent};
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::HotloadMetrics;

/// Observers shared by every target of one dispatcher.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    pub(crate) events: SubscriberRegistry,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<HotloadMetrics>,
}

/// Mutable state, guarded by the monitor's lock.
struct MonitorState {
    value: String,
    /// Scope of the current configuration; replaced on every swap.
    scope: CancellationToken,
    /// Connections opened since the last swap, in opening order.
    outstanding: BTreeMap<u64, Arc<TrackedConnection>>,
    generation: u64,
}

/// Owner of one hot-reload target.
///
/// Lifecycle: active, swapping (under `state`'s lock), active again with the new
/// value, and finally terminated once `parent` is cancelled.
pub(crate) struct TargetMonitor {
    address: String,
    driver: Arc<DriverEntry>,
    /// Driver defaults layered under the address's pass-through options.
    options: BTreeMap<String, String>,
    force_kill: bool,
    parent: CancellationToken,
    state: Mutex<MonitorState>,
    /// Copy of the value published after each swap, for lock-free reads.
    snapshot: ArcSwap<String>,
    next_id: AtomicU64,
    observers: Observers,
}

impl TargetMonitor {
    pub(crate) fn new(
        address: &DispatchAddress,
        value: String,
        driver: Arc<DriverEntry>,
        parent: CancellationToken,
        observers: Observers,
    ) -> Arc<Self> {
        let pass_through = address.driver_options();
        let force_kill = address.force_kill();
        debug!(
            address = %address,
            params = ?address.params(),
            force_kill,
            "parsed hotload query options"
        );

        let options = layer_options(driver.options(), &pass_through);
        let scope = parent.child_token();

        Arc::new(Self {
            address: address.as_str().to_string(),
            driver,
            options,
            force_kill,
            snapshot: ArcSwap::from_pointee(value.clone()),
            parent,
            state: Mutex::new(MonitorState {
                value,
                scope,
                outstanding: BTreeMap::new(),
                generation: 0,
            }),
            next_id: AtomicU64::new(0),
            observers,
        })
    }

    /// Spawn the background loop feeding `updates` into swaps.
    pub(crate) fn start(self: &Arc<Self>, updates: mpsc::Receiver<String>) {
        tokio::spawn(Arc::clone(self).run(updates));
    }

    async fn run(self: Arc<Self>, mut updates: mpsc::Receiver<String>) {
        loop {
            tokio::select! {
                biased;
                _ = self.parent.cancelled() => break,
                next = updates.recv() => match next {
                    Some(value) => self.apply(value).await,
                    None => {
                        warn!(
                            address = %self.address,
                            "update stream closed, keeping current connection information"
                        );
                        self.parent.cancelled().await;
                        break;
                    }
                },
            }
        }

        self.state.lock().await.scope.cancel();
        info!(address = %self.address, "cancelling hotload target scope");
    }

    async fn apply(&self, value: String) {
        match self.swap(value).await {
            Some(event) => {
                info!(
                    address = %self.address,
                    generation = event.generation,
                    invalidated = event.invalidated,
                    force_kill = self.force_kill,
                    "connection information changed"
                );
                self.observers.events.notify_all(&event);
            }
            None => {
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.observers.metrics {
                    metrics.record_duplicate(&self.address);
                }
                debug!(address = %self.address, "ignoring unchanged connection information");
            }
        }
    }

    /// Swap to `value`, retiring every connection opened under the old one.
    ///
    /// Returns `None` when `value` equals the current value. With force-kill,
    /// stale connections are closed before this returns.
    pub(crate) async fn swap(&self, value: String) -> Option<SwapEvent> {
        let mut state = self.state.lock().await;
        if state.value == value {
            return None;
        }

        #[cfg(feature = "metrics")]
        let timer = self.observers.metrics.as_ref().map(HotloadMetrics::start_swap);

        state.scope.cancel();
        state.scope = self.parent.child_token();

        let stale = std::mem::take(&mut state.outstanding);
        for conn in stale.values() {
            conn.invalidate();
            if self.force_kill {
                if let Err(e) = conn.close_raw().await {
                    debug!(
                        address = %self.address,
                        connection = conn.id(),
                        error = %e,
                        "ignoring error while closing stale connection"
                    );
                }
            }
        }

        self.snapshot.store(Arc::new(value.clone()));
        state.value = value;
        state.generation += 1;

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.observers.metrics, timer) {
            metrics.record_swap(&self.address, timer, stale.len(), self.force_kill);
        }

        Some(SwapEvent {
            address: self.address.clone(),
            generation: state.generation,
            invalidated: stale.len(),
            force_killed: self.force_kill,
        })
    }

    /// Open a connection against the current value.
    pub(crate) async fn open(self: &Arc<Self>) -> Result<HotConnection> {
        if self.parent.is_cancelled() {
            return Err(HotloadError::Terminated);
        }

        let opened = self.open_tracked().await;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.observers.metrics {
            metrics.record_open(&self.address, opened.is_ok());
        }

        Ok(HotConnection::new(opened?, Arc::downgrade(self)))
    }

    async fn open_tracked(&self) -> Result<Arc<TrackedConnection>> {
        let mut state = self.state.lock().await;
        let connection_string = merge_connection_options(&state.value, &self.options)?;

        let raw = self
            .driver
            .driver()
            .open(&connection_string)
            .await
            .map_err(HotloadError::Driver)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tracked = Arc::new(TrackedConnection::new(
            id,
            raw,
            connection_string,
            state.scope.clone(),
        ));
        state.outstanding.insert(id, Arc::clone(&tracked));
        Ok(tracked)
    }

    /// Drop a connection from bookkeeping. No-op if a swap already dropped it.
    pub(crate) async fn forget(&self, id: u64) {
        self.state.lock().await.outstanding.remove(&id);
    }

    pub(crate) fn current_value(&self) -> Arc<String> {
        self.snapshot.load_full()
    }

    pub(crate) async fn outstanding(&self) -> usize {
        self.state.lock().await.outstanding.len()
    }

    #[cfg(test)]
    async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }
}
