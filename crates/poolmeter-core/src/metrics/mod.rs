//! In-process metric registry.
//!
//! Counters, gauges and histograms with dynamic tags backed by `DashMap`.
//! Snapshots are pushed to pluggable exporters and can be rendered as
//! Prometheus text.

mod export;
mod id;
mod registry;
mod snapshot;
mod value;

pub use export::{LoggingExporter, MetricsExporter};
pub use id::{MetricId, MetricKind};
pub use registry::{MetricHandle, MetricRegistry, Observation};
pub use snapshot::{MetricsSnapshot, Sample};
pub use value::{HistogramSnapshot, BUCKETS_MICROS};
