//! Metered task spawning.
//!
//! [`TimedSpawner`] wraps `tokio::spawn` and publishes, under a caller-chosen
//! prefix and tag set:
//!
//! - `<prefix>_tasks_submitted_total` (counter)
//! - `<prefix>_tasks_active` (gauge)
//! - `<prefix>_tasks_completed_total` (counter)
//! - `<prefix>_task_duration` (histogram, first poll to completion)

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::task::JoinHandle;

use poolmeter_core::error::{PoolMeterError, Result};
use poolmeter_core::metrics::{MetricHandle, MetricRegistry};

pub const TASKS_SUBMITTED_TOTAL: &str = "tasks_submitted_total";
pub const TASKS_ACTIVE: &str = "tasks_active";
pub const TASKS_COMPLETED_TOTAL: &str = "tasks_completed_total";
pub const TASK_DURATION: &str = "task_duration";

/// Full metric name for `suffix` under `prefix`.
pub fn metric_name(prefix: &str, suffix: &str) -> String {
    format!("{prefix}_{suffix}")
}

#[derive(Clone)]
pub struct TimedSpawner {
    inner: Arc<SpawnerInner>,
}

struct SpawnerInner {
    prefix: String,
    registry: Arc<MetricRegistry>,
    submitted: MetricHandle,
    active: MetricHandle,
    completed: MetricHandle,
    duration: MetricHandle,
    running: Mutex<u64>,
}

impl TimedSpawner {
    pub fn new(registry: Arc<MetricRegistry>, prefix: &str, tags: &[(&str, &str)]) -> Result<Self> {
        if prefix.trim().is_empty() {
            return Err(PoolMeterError::BadConfig(
                "spawner metric prefix must not be empty".into(),
            ));
        }
        let name = |suffix: &str| metric_name(prefix, suffix);
        let inner = SpawnerInner {
            submitted: registry.counter(&name(TASKS_SUBMITTED_TOTAL), tags)?,
            active: registry.gauge(&name(TASKS_ACTIVE), tags)?,
            completed: registry.counter(&name(TASKS_COMPLETED_TOTAL), tags)?,
            duration: registry.histogram(&name(TASK_DURATION), tags)?,
            prefix: prefix.to_string(),
            registry,
            running: Mutex::new(0),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Tasks currently being polled to completion.
    pub fn active(&self) -> u64 {
        *self
            .inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `fut` on the current runtime with metering.
    ///
    /// A task that panics or is aborted still releases its active slot but is
    /// not counted as completed.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        inner.add(&inner.submitted);
        tokio::spawn(async move {
            let run = RunGuard::start(inner);
            let out = fut.await;
            run.finish();
            out
        })
    }
}

impl SpawnerInner {
    fn shift_active(&self, up: bool) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        *running = if up {
            running.saturating_add(1)
        } else {
            running.saturating_sub(1)
        };
        if let Err(e) = self.registry.record_gauge(&self.active, *running as f64) {
            tracing::warn!(metric = %self.active.id(), error = %e, "task gauge update failed");
        }
    }

    fn add(&self, h: &MetricHandle) {
        if let Err(e) = self.registry.increment(h, 1.0) {
            tracing::warn!(metric = %h.id(), error = %e, "task counter update failed");
        }
    }
}

/// Holds one slot of the active gauge for the lifetime of a running task.
struct RunGuard {
    inner: Arc<SpawnerInner>,
    started: Instant,
}

impl RunGuard {
    fn start(inner: Arc<SpawnerInner>) -> Self {
        inner.shift_active(true);
        Self {
            inner,
            started: Instant::now(),
        }
    }

    fn finish(self) {
        let inner = &self.inner;
        if let Err(e) = inner.registry.observe(&inner.duration, self.started.elapsed()) {
            tracing::warn!(
                metric = %inner.duration.id(),
                error = %e,
                "task duration update failed"
            );
        }
        inner.add(&inner.completed);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.inner.shift_active(false);
    }
}
