//! Gauges and counters published by a connection pool.

use std::sync::Arc;

use poolmeter_core::error::Result;
use poolmeter_core::metrics::{MetricHandle, MetricRegistry};

pub const MAX_CONNECTIONS: &str = "max_connections";
pub const ACTIVE_CONNECTIONS: &str = "active_connections";
pub const IDLE_CONNECTIONS: &str = "idle_connections";
pub const TOTAL_CONNECTIONS: &str = "total_connections";
pub const PENDING_ACQUIRES: &str = "pending_acquires";
pub const ACQUIRE_TIMEOUTS_TOTAL: &str = "acquire_timeouts_total";
pub const CONNECTIONS_CREATED_TOTAL: &str = "connections_created_total";
pub const CONNECTIONS_CLOSED_TOTAL: &str = "connections_closed_total";

/// Point-in-time pool counts pushed to the gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Usage {
    pub in_use: usize,
    pub idle: usize,
    pub pending: usize,
}

pub(crate) struct PoolMetrics {
    registry: Arc<MetricRegistry>,
    max: MetricHandle,
    active: MetricHandle,
    idle: MetricHandle,
    total: MetricHandle,
    pending: MetricHandle,
    timeouts: MetricHandle,
    created: MetricHandle,
    closed: MetricHandle,
}

impl PoolMetrics {
    pub(crate) fn register(registry: Arc<MetricRegistry>, tags: &[(&str, &str)]) -> Result<Self> {
        Ok(Self {
            max: registry.gauge(MAX_CONNECTIONS, tags)?,
            active: registry.gauge(ACTIVE_CONNECTIONS, tags)?,
            idle: registry.gauge(IDLE_CONNECTIONS, tags)?,
            total: registry.gauge(TOTAL_CONNECTIONS, tags)?,
            pending: registry.gauge(PENDING_ACQUIRES, tags)?,
            timeouts: registry.counter(ACQUIRE_TIMEOUTS_TOTAL, tags)?,
            created: registry.counter(CONNECTIONS_CREATED_TOTAL, tags)?,
            closed: registry.counter(CONNECTIONS_CLOSED_TOTAL, tags)?,
            registry,
        })
    }

    pub(crate) fn set_capacity(&self, capacity: usize) {
        self.set(&self.max, capacity as f64);
    }

    pub(crate) fn publish(&self, u: Usage) {
        self.set(&self.active, u.in_use as f64);
        self.set(&self.idle, u.idle as f64);
        self.set(&self.total, (u.in_use + u.idle) as f64);
        self.set(&self.pending, u.pending as f64);
    }

    pub(crate) fn acquire_timed_out(&self) {
        self.add(&self.timeouts, 1);
    }

    pub(crate) fn created(&self) {
        self.add(&self.created, 1);
    }

    pub(crate) fn closed(&self, n: usize) {
        if n > 0 {
            self.add(&self.closed, n);
        }
    }

    fn set(&self, h: &MetricHandle, v: f64) {
        if let Err(e) = self.registry.record_gauge(h, v) {
            tracing::warn!(metric = %h.id(), error = %e, "pool gauge update failed");
        }
    }

    fn add(&self, h: &MetricHandle, n: usize) {
        if let Err(e) = self.registry.increment(h, n as f64) {
            tracing::warn!(metric = %h.id(), error = %e, "pool counter update failed");
        }
    }
}
