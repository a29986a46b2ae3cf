//! Observability plumbing: tracing setup, periodic metric export and metered
//! task spawning.

pub mod logging;
pub mod reporter;
pub mod scheduler;

use std::sync::Arc;

use poolmeter_core::error::Result;
use poolmeter_core::metrics::{LoggingExporter, MetricRegistry};

use crate::config::MetricsSection;

pub use reporter::{Reporter, ReporterHandle};
pub use scheduler::TimedSpawner;

/// Attach the configured exporters and start the periodic reporter.
/// Must be called from within a tokio runtime.
pub fn start_reporting(
    cfg: &MetricsSection,
    registry: Arc<MetricRegistry>,
) -> Result<ReporterHandle> {
    let handle = Reporter::spawn(Arc::clone(&registry), cfg.export_interval())?;
    if cfg.logging_exporter {
        registry.add_exporter(Arc::new(LoggingExporter::new()));
    }
    Ok(handle)
}
