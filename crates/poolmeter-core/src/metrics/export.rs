use std::sync::atomic::{AtomicU64, Ordering};

use super::snapshot::{MetricsSnapshot, Sample};

/// Push-style metrics sink.
///
/// `push` is called with a full snapshot on every export (periodic reporter
/// ticks and the final flush on registry close). It must not block.
pub trait MetricsExporter: Send + Sync {
    fn name(&self) -> &str;
    fn push(&self, snapshot: &MetricsSnapshot);
    /// Release exporter resources. Called once by `MetricRegistry::close`.
    fn close(&self) {}
}

/// Writes every metric as a structured `tracing` event.
#[derive(Debug, Default)]
pub struct LoggingExporter {
    pushes: AtomicU64,
}

impl LoggingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots pushed so far.
    pub fn pushes(&self) -> u64 {
        self.pushes.load(Ordering::Relaxed)
    }
}

impl MetricsExporter for LoggingExporter {
    fn name(&self) -> &str {
        "logging"
    }

    fn push(&self, snapshot: &MetricsSnapshot) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        for (id, sample) in snapshot {
            match sample {
                Sample::Histogram(h) => {
                    let mean_us = if h.count == 0 { 0 } else { h.sum_micros / h.count };
                    tracing::info!(
                        target: "poolmeter::metrics",
                        metric = %id,
                        count = h.count,
                        sum_us = h.sum_micros,
                        mean_us,
                        "histogram"
                    );
                }
                other => {
                    tracing::info!(
                        target: "poolmeter::metrics",
                        metric = %id,
                        kind = %other.kind(),
                        value = other.value(),
                        "metric"
                    );
                }
            }
        }
    }

    fn close(&self) {
        tracing::debug!(
            target: "poolmeter::metrics",
            pushes = self.pushes(),
            "logging exporter closed"
        );
    }
}
