//! Built-in metrics for hot-reload targets.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Swaps and ignored duplicate updates
//! - Time spent swapping
//! - Connections opened, failed, invalidated and force-closed
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotload::prelude::*;
//! use opentelemetry::global;
//!
//! let dispatcher = Dispatcher::builder()
//!     .with_metrics(global::meter("my-app"))
//!     .build();
//! ```

mod hotload_metrics;
#[cfg(test)]
pub(crate) mod testing;

pub use hotload_metrics::HotloadMetrics;
