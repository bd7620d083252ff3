//! Swap and connection metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for hot-reload targets.
///
/// Every measurement carries the target's dispatch address as the `target`
/// attribute.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::metrics::HotloadMetrics;
/// use opentelemetry::global;
///
/// let metrics = HotloadMetrics::new(global::meter("hotload"));
///
/// let timer = metrics.start_swap();
/// // ... swap ...
/// metrics.record_swap("fsnotify://postgres/etc/app/dsn.txt", timer, 3, false);
/// ```
#[derive(Clone)]
pub struct HotloadMetrics {
    swaps: Counter<u64>,
    duplicates_ignored: Counter<u64>,
    swap_duration: Histogram<f64>,
    connections_opened: Counter<u64>,
    open_failures: Counter<u64>,
    connections_invalidated: Counter<u64>,
    connections_force_closed: Counter<u64>,
}

impl HotloadMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let swaps = meter
            .u64_counter("hotload.swaps")
            .with_description("Number of completed connection string swaps")
            .build();

        let duplicates_ignored = meter
            .u64_counter("hotload.swaps.duplicates_ignored")
            .with_description("Updates ignored because the value did not change")
            .build();

        let swap_duration = meter
            .f64_histogram("hotload.swap.duration")
            .with_description("Time spent holding the target lock during a swap")
            .with_unit("s")
            .build();

        let connections_opened = meter
            .u64_counter("hotload.connections.opened")
            .with_description("Connections opened through hotload targets")
            .build();

        let open_failures = meter
            .u64_counter("hotload.connections.open_failures")
            .with_description("Failed attempts to open a connection")
            .build();

        let connections_invalidated = meter
            .u64_counter("hotload.connections.invalidated")
            .with_description("Connections invalidated by a swap")
            .build();

        let connections_force_closed = meter
            .u64_counter("hotload.connections.force_closed")
            .with_description("Connections closed by a force-kill swap")
            .build();

        Self {
            swaps,
            duplicates_ignored,
            swap_duration,
            connections_opened,
            open_failures,
            connections_invalidated,
            connections_force_closed,
        }
    }

    /// Start timing a swap.
    pub fn start_swap(&self) -> Instant {
        Instant::now()
    }

    /// Record a completed swap that invalidated `invalidated` connections.
    pub fn record_swap(
        &self,
        target: &str,
        start: Instant,
        invalidated: usize,
        force_killed: bool,
    ) {
        let attrs = [KeyValue::new("target", target.to_string())];
        self.swaps.add(1, &attrs);
        self.swap_duration.record(start.elapsed().as_secs_f64(), &attrs);
        self.connections_invalidated.add(invalidated as u64, &attrs);
        if force_killed {
            self.connections_force_closed.add(invalidated as u64, &attrs);
        }
    }

    /// Record an update that repeated the current value.
    pub fn record_duplicate(&self, target: &str) {
        self.duplicates_ignored
            .add(1, &[KeyValue::new("target", target.to_string())]);
    }

    /// Record the outcome of an open.
    pub fn record_open(&self, target: &str, success: bool) {
        let attrs = [KeyValue::new("target", target.to_string())];
        if success {
            self.connections_opened.add(1, &attrs);
        } else {
            self.open_failures.add(1, &attrs);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::metrics::testing::MetricsHarness;

    #[test]
    fn test_swap_records_counts_and_duration() {
        let harness = MetricsHarness::new();
        let metrics = harness.metrics();

        let timer = metrics.start_swap();
        metrics.record_swap("manual://d/db", timer, 2, false);
        let timer = metrics.start_swap();
        metrics.record_swap("manual://d/db", timer, 3, true);

        assert_eq!(harness.counter("hotload.swaps"), 2);
        assert_eq!(harness.counter("hotload.connections.invalidated"), 5);
        assert_eq!(harness.counter("hotload.connections.force_closed"), 3);
        assert_eq!(harness.histogram_count("hotload.swap.duration"), 2);
    }

    #[test]
    fn test_open_outcomes_are_counted_separately() {
        let harness = MetricsHarness::new();
        let metrics = harness.metrics();

        metrics.record_open("manual://d/db", true);
        metrics.record_open("manual://d/db", true);
        metrics.record_open("manual://d/other", false);
        metrics.record_duplicate("manual://d/db");

        assert_eq!(harness.counter("hotload.connections.opened"), 2);
        assert_eq!(harness.counter("hotload.connections.open_failures"), 1);
        assert_eq!(harness.counter("hotload.swaps.duplicates_ignored"), 1);
        assert_eq!(harness.counter("hotload.swaps"), 0);
    }

    #[test]
    fn test_clones_share_instruments() {
        let harness = MetricsHarness::new();
        let metrics = harness.metrics();
        let metrics2 = metrics.clone();

        metrics.record_open("manual://d/db", true);
        metrics2.record_open("manual://d/db", true);
        assert_eq!(harness.counter("hotload.connections.opened"), 2);
    }
}
