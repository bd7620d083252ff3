//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hotload::driver::{Connection, Driver};
use hotload::error::BoxError;
use hotload::notify::SubscriptionHandle;
use hotload::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// What the mock driver saw for one opened connection.
pub struct Opened {
    pub connection_string: String,
    closed: AtomicBool,
}

impl Opened {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct RecordingConnection(Arc<Opened>);

#[async_trait]
impl Connection for RecordingConnection {
    async fn execute(&self, _statement: &str) -> std::result::Result<u64, BoxError> {
        Ok(1)
    }

    async fn close(&self) -> std::result::Result<(), BoxError> {
        self.0.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver that records every connection string it is asked to open.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    opened: Arc<Mutex<Vec<Arc<Opened>>>>,
}

impl RecordingDriver {
    pub fn opened(&self) -> Vec<Arc<Opened>> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn open(
        &self,
        connection_string: &str,
    ) -> std::result::Result<Box<dyn Connection>, BoxError> {
        let opened = Arc::new(Opened {
            connection_string: connection_string.to_string(),
            closed: AtomicBool::new(false),
        });
        self.opened.lock().push(Arc::clone(&opened));
        Ok(Box::new(RecordingConnection(opened)))
    }
}

/// A dispatcher with `driver` registered as "d" and a manual strategy as "strat".
pub fn dispatcher(driver: &RecordingDriver, manual: &ManualStrategy) -> Dispatcher {
    let registry = Arc::new(Registry::new());
    registry.register_driver("d", driver.clone());
    registry.register_strategy("strat", manual.clone());
    Dispatcher::new(registry)
}

/// Forward every swap event of `dispatcher` into a channel.
pub fn swap_events(dispatcher: &Dispatcher) -> (SubscriptionHandle, SwapEvents) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = dispatcher.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    (handle, SwapEvents(rx))
}

pub struct SwapEvents(UnboundedReceiver<SwapEvent>);

impl SwapEvents {
    /// The next completed swap. Panics if none arrives in time.
    pub async fn next(&mut self) -> SwapEvent {
        tokio::time::timeout(Duration::from_secs(2), self.0.recv())
            .await
            .expect("no swap within timeout")
            .expect("subscription closed")
    }

    /// Whether a swap has completed that was not yet consumed.
    pub fn pending(&mut self) -> bool {
        !self.0.is_empty()
    }
}
