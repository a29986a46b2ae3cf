use std::sync::Arc;
use std::time::{Duration, Instant};

use poolmeter_core::error::{PoolMeterError, Result};
use poolmeter_core::metrics::{MetricHandle, MetricRegistry, Observation};

use crate::config::PoolConfig;
use crate::pool::ConnectionPool;

use super::operation::{RemoteOperation, Response};

pub const REQUEST_DURATION: &str = "http_client_request_duration";
pub const REQUESTS_TOTAL: &str = "http_client_requests_total";
pub const BYTES_RECEIVED_TOTAL: &str = "http_client_bytes_received_total";

struct ClientMetrics {
    duration: MetricHandle,
    success: MetricHandle,
    failure: MetricHandle,
    bytes: MetricHandle,
}

impl ClientMetrics {
    fn register(registry: &MetricRegistry, tags: &[(&str, &str)]) -> Result<Self> {
        let with_outcome = |outcome: &'static str| {
            let mut t = tags.to_vec();
            t.push(("outcome", outcome));
            t
        };
        Ok(Self {
            duration: registry.histogram(REQUEST_DURATION, tags)?,
            success: registry.counter(REQUESTS_TOTAL, &with_outcome("success"))?,
            failure: registry.counter(REQUESTS_TOTAL, &with_outcome("failure"))?,
            bytes: registry.counter(BYTES_RECEIVED_TOTAL, tags)?,
        })
    }
}

/// Issues remote operations through a [`ConnectionPool`] and records
/// per-request latency, outcome and byte counts.
pub struct HttpClient {
    pool: ConnectionPool,
    registry: Arc<MetricRegistry>,
    operation: Arc<dyn RemoteOperation>,
    acquire_timeout: Duration,
    metrics: ClientMetrics,
}

impl HttpClient {
    pub fn new(
        pool: ConnectionPool,
        registry: Arc<MetricRegistry>,
        operation: Arc<dyn RemoteOperation>,
        acquire_timeout: Duration,
        tags: &[(&str, &str)],
    ) -> Result<Self> {
        let metrics = ClientMetrics::register(&registry, tags)?;
        Ok(Self {
            pool,
            registry,
            operation,
            acquire_timeout,
            metrics,
        })
    }

    /// Build the pool from config and wrap it, sharing the pool's tags.
    pub fn from_config(
        cfg: &PoolConfig,
        registry: Arc<MetricRegistry>,
        operation: Arc<dyn RemoteOperation>,
    ) -> Result<Self> {
        let pool = ConnectionPool::new(cfg, Arc::clone(&registry))?;
        Self::new(pool, registry, operation, cfg.acquire_timeout(), &cfg.tag_pairs())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Run the operation against `target` on a pooled connection.
    ///
    /// Acquire failures (`PoolExhausted`, `PoolClosed`) are returned as-is;
    /// operation failures come back as `RequestFailed` with the original cause
    /// as source. The connection is returned to the pool on every path.
    #[tracing::instrument(skip(self), fields(pool = %self.pool.name()))]
    pub async fn request(&self, target: &str) -> Result<Response> {
        let lease = self.pool.lease(self.acquire_timeout).await?;

        let started = Instant::now();
        let outcome = self.operation.perform(target, lease.connection()).await;
        let elapsed = started.elapsed();
        let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

        if let Err(e) = lease.release() {
            tracing::debug!(error = %e, "connection not returned to pool");
        }

        self.note(self.registry.record(&Observation::new(
            self.metrics.duration.id().clone(),
            elapsed.as_secs_f64(),
        )));

        match outcome {
            Ok(resp) => {
                self.note(self.registry.increment(&self.metrics.success, 1.0));
                self.note(
                    self.registry
                        .increment(&self.metrics.bytes, resp.body.len() as f64),
                );
                tracing::debug!(
                    status = resp.status,
                    bytes = resp.body.len(),
                    elapsed_us,
                    "request completed"
                );
                Ok(resp)
            }
            Err(cause) => {
                self.note(self.registry.increment(&self.metrics.failure, 1.0));
                tracing::warn!(
                    error = %cause,
                    elapsed_us,
                    "request failed"
                );
                Err(PoolMeterError::request_failed(cause))
            }
        }
    }

    fn note(&self, r: Result<()>) {
        if let Err(e) = r {
            tracing::warn!(error = %e, "client metric update failed");
        }
    }
}
