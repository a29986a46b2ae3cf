use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use poolmeter_core::error::{PoolMeterError, Result};
use poolmeter_core::metrics::MetricRegistry;

/// Periodically pushes registry snapshots to its exporters.
pub struct Reporter;

impl Reporter {
    /// Spawn the export loop on the current tokio runtime.
    ///
    /// The first export happens one `interval` after spawning. Dropping the
    /// handle stops the loop as well. A zero or unrepresentable interval is
    /// rejected with `BadConfig`.
    pub fn spawn(registry: Arc<MetricRegistry>, interval: Duration) -> Result<ReporterHandle> {
        if interval.is_zero() {
            return Err(PoolMeterError::BadConfig(
                "reporter interval must be non-zero".into(),
            ));
        }
        let start = Instant::now().checked_add(interval).ok_or_else(|| {
            PoolMeterError::BadConfig(format!("reporter interval {interval:?} is too large"))
        })?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let reg = Arc::clone(&registry);

        let task = tokio::spawn(async move {
            let mut tick = interval_at(start, interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(?interval, "metrics reporter started");
            loop {
                tokio::select! {
                    _ = tick.tick() => reg.export(),
                    _ = &mut stop_rx => break,
                }
            }
            tracing::debug!("metrics reporter stopped");
        });

        Ok(ReporterHandle {
            stop: Some(stop_tx),
            task: Some(task),
            registry,
        })
    }
}

pub struct ReporterHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    registry: Arc<MetricRegistry>,
}

impl ReporterHandle {
    /// Stop the loop and push one final snapshot.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "metrics reporter task failed");
            }
        }
        self.registry.export();
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
