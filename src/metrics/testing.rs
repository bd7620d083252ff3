//! In-memory meter for asserting recorded values in tests.

use super::HotloadMetrics;
use opentelemetry::metrics::MeterProvider;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};

pub(crate) struct MetricsHarness {
    provider: SdkMeterProvider,
    exporter: InMemoryMetricExporter,
}

impl MetricsHarness {
    pub(crate) fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone()).build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        Self { provider, exporter }
    }

    pub(crate) fn metrics(&self) -> HotloadMetrics {
        HotloadMetrics::new(self.provider.meter("hotload-test"))
    }

    /// Cumulative value of a `u64` counter across all attribute sets.
    pub(crate) fn counter(&self, name: &str) -> u64 {
        self.provider.force_flush().unwrap();
        let exported = self.exporter.get_finished_metrics().unwrap();
        let Some(latest) = exported.last() else {
            return 0;
        };

        let mut total = 0;
        for scope in latest.scope_metrics() {
            for metric in scope.metrics().filter(|m| m.name() == name) {
                if let AggregatedMetrics::U64(MetricData::Sum(sum)) = metric.data() {
                    total += sum.data_points().map(|point| point.value()).sum::<u64>();
                }
            }
        }
        total
    }

    /// Number of recorded samples of an `f64` histogram.
    pub(crate) fn histogram_count(&self, name: &str) -> u64 {
        self.provider.force_flush().unwrap();
        let exported = self.exporter.get_finished_metrics().unwrap();
        let Some(latest) = exported.last() else {
            return 0;
        };

        let mut total = 0;
        for scope in latest.scope_metrics() {
            for metric in scope.metrics().filter(|m| m.name() == name) {
                if let AggregatedMetrics::F64(MetricData::Histogram(histogram)) = metric.data() {
                    total += histogram.data_points().map(|point| point.count()).sum::<u64>();
                }
            }
        }
        total
    }
}
