use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{PoolMeterError, Result};

use super::export::MetricsExporter;
use super::id::{MetricId, MetricKind};
use super::snapshot::{MetricsSnapshot, Sample};
use super::value::{AtomicF64, AtomicHistogram};

#[derive(Debug)]
enum Cell {
    Scalar(AtomicF64),
    Histogram(AtomicHistogram),
}

#[derive(Debug)]
struct MetricEntry {
    id: MetricId,
    kind: MetricKind,
    cell: Cell,
}

/// Cheap clonable reference to one registered metric.
#[derive(Debug, Clone)]
pub struct MetricHandle {
    inner: Arc<MetricEntry>,
}

impl MetricHandle {
    fn new(id: MetricId, kind: MetricKind) -> Self {
        let cell = match kind {
            MetricKind::Counter | MetricKind::Gauge => Cell::Scalar(AtomicF64::new(0.0)),
            MetricKind::Histogram => Cell::Histogram(AtomicHistogram::default()),
        };
        Self {
            inner: Arc::new(MetricEntry { id, kind, cell }),
        }
    }

    pub fn id(&self) -> &MetricId {
        &self.inner.id
    }

    pub fn kind(&self) -> MetricKind {
        self.inner.kind
    }

    /// Current value. Histograms report their observation count.
    pub fn value(&self) -> f64 {
        match &self.inner.cell {
            Cell::Scalar(v) => v.load(),
            Cell::Histogram(h) => h.count() as f64,
        }
    }

    fn sample(&self) -> Sample {
        match (&self.inner.cell, self.inner.kind) {
            (Cell::Histogram(h), _) => Sample::Histogram(h.snapshot()),
            (Cell::Scalar(v), MetricKind::Counter) => Sample::Counter(v.load()),
            (Cell::Scalar(v), _) => Sample::Gauge(v.load()),
        }
    }

    fn expect_kind(&self, expected: MetricKind) -> Result<()> {
        if self.kind() != expected {
            return Err(PoolMeterError::WrongMetricKind {
                id: self.id().clone(),
                actual: self.kind(),
                expected,
            });
        }
        Ok(())
    }

    fn scalar(&self) -> Result<&AtomicF64> {
        match &self.inner.cell {
            Cell::Scalar(v) => Ok(v),
            Cell::Histogram(_) => Err(PoolMeterError::Internal(format!(
                "scalar cell missing for {}",
                self.id()
            ))),
        }
    }
}

/// Immutable measurement event addressed to a registered metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: MetricId,
    /// Counter delta, gauge value, or histogram sample in seconds.
    pub value: f64,
    pub timestamp: SystemTime,
}

impl Observation {
    pub fn new(id: MetricId, value: f64) -> Self {
        Self {
            id,
            value,
            timestamp: SystemTime::now(),
        }
    }
}

/// Store of named, tagged numeric metrics.
///
/// Registration is serialized per identity by the sharded map; value updates
/// go straight to per-metric atomics. Exporters attached with
/// [`add_exporter`](Self::add_exporter) receive every [`export`](Self::export)
/// and a final flush on [`close`](Self::close).
#[derive(Default)]
pub struct MetricRegistry {
    metrics: DashMap<MetricId, MetricHandle>,
    exporters: RwLock<Vec<Arc<dyn MetricsExporter>>>,
    closed: AtomicBool,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or look up) a metric.
    ///
    /// Re-registering the same identity with the same kind returns the existing
    /// handle; a different kind is rejected with `DuplicateMetric`.
    pub fn register(
        &self,
        name: &str,
        tags: &[(&str, &str)],
        kind: MetricKind,
    ) -> Result<MetricHandle> {
        self.register_id(MetricId::new(name, tags), kind)
    }

    pub fn register_id(&self, id: MetricId, kind: MetricKind) -> Result<MetricHandle> {
        match self.metrics.entry(id) {
            Entry::Occupied(o) => {
                let existing = o.get();
                if existing.kind() != kind {
                    return Err(PoolMeterError::DuplicateMetric {
                        id: existing.id().clone(),
                        existing: existing.kind(),
                        requested: kind,
                    });
                }
                Ok(existing.clone())
            }
            Entry::Vacant(v) => {
                let handle = MetricHandle::new(v.key().clone(), kind);
                tracing::debug!(metric = %handle.id(), %kind, "metric registered");
                v.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    pub fn counter(&self, name: &str, tags: &[(&str, &str)]) -> Result<MetricHandle> {
        self.register(name, tags, MetricKind::Counter)
    }

    pub fn gauge(&self, name: &str, tags: &[(&str, &str)]) -> Result<MetricHandle> {
        self.register(name, tags, MetricKind::Gauge)
    }

    pub fn histogram(&self, name: &str, tags: &[(&str, &str)]) -> Result<MetricHandle> {
        self.register(name, tags, MetricKind::Histogram)
    }

    /// Overwrite a gauge (last write wins).
    pub fn record_gauge(&self, handle: &MetricHandle, value: f64) -> Result<()> {
        handle.expect_kind(MetricKind::Gauge)?;
        if !value.is_finite() {
            return Err(PoolMeterError::InvalidValue(format!(
                "gauge {} must be finite, got {value}",
                handle.id()
            )));
        }
        handle.scalar()?.store(value);
        Ok(())
    }

    /// Atomically add `delta` to a counter.
    pub fn increment(&self, handle: &MetricHandle, delta: f64) -> Result<()> {
        handle.expect_kind(MetricKind::Counter)?;
        if !delta.is_finite() || delta < 0.0 {
            return Err(PoolMeterError::InvalidValue(format!(
                "counter {} delta must be finite and non-negative, got {delta}",
                handle.id()
            )));
        }
        handle.scalar()?.fetch_add(delta);
        Ok(())
    }

    /// Record one histogram sample.
    pub fn observe(&self, handle: &MetricHandle, duration: Duration) -> Result<()> {
        handle.expect_kind(MetricKind::Histogram)?;
        match &handle.inner.cell {
            Cell::Histogram(h) => {
                h.observe(duration);
                Ok(())
            }
            Cell::Scalar(_) => Err(PoolMeterError::Internal(format!(
                "histogram cell missing for {}",
                handle.id()
            ))),
        }
    }

    /// Apply an observation to the metric registered under its identity.
    pub fn record(&self, obs: &Observation) -> Result<()> {
        let handle = self
            .metrics
            .get(&obs.id)
            .map(|r| r.value().clone())
            .ok_or_else(|| PoolMeterError::UnknownMetric(obs.id.clone()))?;

        match handle.kind() {
            MetricKind::Counter => self.increment(&handle, obs.value),
            MetricKind::Gauge => self.record_gauge(&handle, obs.value),
            MetricKind::Histogram => {
                let d = Duration::try_from_secs_f64(obs.value).map_err(|e| {
                    PoolMeterError::InvalidValue(format!(
                        "histogram {} sample {}: {e}",
                        obs.id, obs.value
                    ))
                })?;
                self.observe(&handle, d)
            }
        }
    }

    pub fn get(&self, name: &str, tags: &[(&str, &str)]) -> Option<MetricHandle> {
        self.metrics
            .get(&MetricId::new(name, tags))
            .map(|r| r.value().clone())
    }

    /// Current value, or `None` if nothing is registered under `(name, tags)`.
    pub fn snapshot(&self, name: &str, tags: &[(&str, &str)]) -> Option<f64> {
        self.get(name, tags).map(|h| h.value())
    }

    pub fn snapshot_all(&self) -> MetricsSnapshot {
        let mut snap = MetricsSnapshot::default();
        for r in self.metrics.iter() {
            snap.insert(r.key().clone(), r.value().sample());
        }
        snap
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Attach an exporter. Exporters added after `close` are closed immediately.
    pub fn add_exporter(&self, exporter: Arc<dyn MetricsExporter>) {
        let mut exporters = self.exporters.write().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            drop(exporters);
            tracing::warn!(exporter = exporter.name(), "registry closed; exporter not attached");
            exporter.close();
            return;
        }
        exporters.push(exporter);
    }

    pub fn exporter_count(&self) -> usize {
        self.exporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Push the current snapshot to every attached exporter.
    ///
    /// The exporter list stays read-locked while pushing; `close` waits for
    /// in-flight pushes. Exporters must not call `add_exporter` or `close`
    /// from `push`.
    pub fn export(&self) {
        let exporters = self.exporters.read().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() || exporters.is_empty() {
            return;
        }
        let snap = self.snapshot_all();
        for e in exporters.iter() {
            e.push(&snap);
        }
    }

    /// Flush and release every exporter. Idempotent.
    pub fn close(&self) {
        let exporters = {
            let mut guard = self.exporters.write().unwrap_or_else(PoisonError::into_inner);
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *guard)
        };
        let snap = self.snapshot_all();
        for e in &exporters {
            e.push(&snap);
            e.close();
        }
        tracing::info!(
            exporters = exporters.len(),
            metrics = snap.len(),
            "metric registry closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Prometheus text exposition of the current snapshot.
    pub fn render_prometheus(&self) -> String {
        self.snapshot_all().render_prometheus()
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.metrics.len())
            .field("exporters", &self.exporter_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
