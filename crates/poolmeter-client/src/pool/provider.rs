use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tokio::time::Instant;

use poolmeter_core::error::{PoolMeterError, Result};
use poolmeter_core::metrics::MetricRegistry;

use crate::config::PoolConfig;

use super::connection::PooledConnection;
use super::lease::ConnectionLease;
use super::metrics::{PoolMetrics, Usage};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct IdleConn {
    id: u64,
    since: Instant,
}

#[derive(Debug, Default)]
struct PoolState {
    /// Oldest idle connection at the front.
    idle: VecDeque<IdleConn>,
    in_use: HashSet<u64>,
    /// Connections that were lent out when the pool shut down.
    lent_at_shutdown: HashSet<u64>,
    pending: usize,
    next_conn_id: u64,
    closed: bool,
}

impl PoolState {
    fn usage(&self) -> Usage {
        Usage {
            in_use: self.in_use.len(),
            idle: self.idle.len(),
            pending: self.pending,
        }
    }
}

/// Bounded pool of reusable connections.
///
/// The semaphore holds one permit per connection that may still be lent out,
/// so `in_use <= capacity` holds regardless of scheduling; the connection set
/// itself sits behind a mutex. Gauges are written while that mutex is held, so
/// every published value matches a real pool state.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    id: u64,
    name: String,
    capacity: usize,
    max_idle: Option<Duration>,
    permits: Semaphore,
    state: Mutex<PoolState>,
    metrics: PoolMetrics,
}

impl ConnectionPool {
    pub fn new(cfg: &PoolConfig, registry: Arc<MetricRegistry>) -> Result<Self> {
        cfg.validate()?;

        let metrics = PoolMetrics::register(registry, &cfg.tag_pairs())?;
        metrics.set_capacity(cfg.capacity);
        metrics.publish(PoolState::default().usage());

        let inner = PoolInner {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            name: cfg.name.clone(),
            capacity: cfg.capacity,
            max_idle: cfg.max_idle(),
            permits: Semaphore::new(cfg.capacity),
            state: Mutex::new(PoolState {
                next_conn_id: 1,
                ..PoolState::default()
            }),
            metrics,
        };
        tracing::info!(pool = %inner.name, capacity = inner.capacity, "connection pool created");
        Ok(Self { inner: Arc::new(inner) })
    }

    /// Untagged pool with default settings besides `capacity`.
    pub fn with_capacity(capacity: usize, registry: Arc<MetricRegistry>) -> Result<Self> {
        Self::new(&PoolConfig::with_capacity(capacity), registry)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Wait up to `timeout` for a connection.
    ///
    /// A zero timeout makes a single attempt. Dropping the returned future
    /// gives up the wait without touching the pool.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledConnection> {
        let inner = &self.inner;

        let permit = match inner.permits.try_acquire() {
            Ok(p) => p,
            Err(TryAcquireError::Closed) => return Err(PoolMeterError::PoolClosed),
            Err(TryAcquireError::NoPermits) => {
                if timeout.is_zero() {
                    return Err(inner.exhausted(timeout));
                }
                let _pending = PendingGuard::enter(inner);
                match tokio::time::timeout(timeout, inner.permits.acquire()).await {
                    Ok(Ok(p)) => p,
                    Ok(Err(_)) => return Err(PoolMeterError::PoolClosed),
                    Err(_) => return Err(inner.exhausted(timeout)),
                }
            }
        };

        inner.checkout(permit)
    }

    /// Like [`acquire`](Self::acquire), but the connection goes back to the
    /// pool when the lease is dropped.
    pub async fn lease(&self, timeout: Duration) -> Result<ConnectionLease> {
        let conn = self.acquire(timeout).await?;
        Ok(ConnectionLease::new(self.clone(), conn))
    }

    /// Return a lent connection (`InUse -> Idle`).
    pub fn release(&self, conn: PooledConnection) -> Result<()> {
        self.release_ref(&conn)
    }

    pub(crate) fn release_ref(&self, conn: &PooledConnection) -> Result<()> {
        let inner = &self.inner;
        if conn.pool_id() != inner.id {
            tracing::warn!(
                pool = %inner.name,
                conn_id = conn.id(),
                owner = conn.pool_id(),
                "release into foreign pool"
            );
            return Err(PoolMeterError::InvalidRelease(format!(
                "connection {} belongs to pool {}, not {}",
                conn.id(),
                conn.pool_id(),
                inner.id
            )));
        }

        let mut st = inner.lock();
        if st.lent_at_shutdown.remove(&conn.id()) {
            tracing::debug!(
                pool = %inner.name,
                conn_id = conn.id(),
                "connection returned after shutdown"
            );
            return Err(PoolMeterError::PoolClosed);
        }
        if !st.in_use.remove(&conn.id()) {
            tracing::warn!(
                pool = %inner.name,
                conn_id = conn.id(),
                "release of connection not in use"
            );
            return Err(PoolMeterError::InvalidRelease(format!(
                "connection {} is not in use in pool {}",
                conn.id(),
                inner.name
            )));
        }

        st.idle.push_back(IdleConn {
            id: conn.id(),
            since: Instant::now(),
        });
        inner.permits.add_permits(1);
        inner.metrics.publish(st.usage());
        tracing::debug!(
            pool = %inner.name,
            conn_id = conn.id(),
            in_use = st.in_use.len(),
            "connection released"
        );
        Ok(())
    }

    /// Count of connections currently lent out.
    pub fn current_usage(&self) -> usize {
        self.inner.lock().in_use.len()
    }

    pub fn idle_count(&self) -> usize {
        self.inner.lock().idle.len()
    }

    /// Callers currently waiting in `acquire`.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Close idle connections that exceeded the configured max idle time.
    /// Returns how many were closed; always 0 when eviction is disabled.
    pub fn evict_idle(&self) -> usize {
        let mut st = self.inner.lock();
        let n = self.inner.evict_expired(&mut st);
        if n > 0 {
            self.inner.metrics.publish(st.usage());
        }
        n
    }

    /// Close every connection and reject further acquires. Idempotent.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        let mut st = inner.lock();
        if st.closed {
            return;
        }
        st.closed = true;
        inner.permits.close();

        let idle = st.idle.len();
        st.idle.clear();
        let lent: Vec<u64> = st.in_use.drain().collect();
        let lent_count = lent.len();
        st.lent_at_shutdown.extend(lent);

        inner.metrics.closed(idle + lent_count);
        inner.metrics.publish(st.usage());
        tracing::info!(
            pool = %inner.name,
            closed_idle = idle,
            closed_in_use = lent_count,
            "connection pool shut down"
        );
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Poisoning only means another caller panicked mid-update; the state
        // itself is always left consistent, so keep serving.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exhausted(&self, timeout: Duration) -> PoolMeterError {
        self.metrics.acquire_timed_out();
        tracing::warn!(pool = %self.name, capacity = self.capacity, ?timeout, "pool exhausted");
        PoolMeterError::PoolExhausted { timeout }
    }

    /// Turn a permit into a lent connection, reusing an idle one when possible.
    fn checkout(&self, permit: SemaphorePermit<'_>) -> Result<PooledConnection> {
        let mut st = self.lock();
        if st.closed {
            return Err(PoolMeterError::PoolClosed);
        }

        self.evict_expired(&mut st);

        let (id, reused) = match st.idle.pop_front() {
            Some(c) => (c.id, true),
            None => {
                let id = st.next_conn_id;
                st.next_conn_id += 1;
                self.metrics.created();
                (id, false)
            }
        };
        st.in_use.insert(id);
        // The permit stays consumed until the matching release.
        permit.forget();

        self.metrics.publish(st.usage());
        tracing::debug!(
            pool = %self.name,
            conn_id = id,
            reused,
            in_use = st.in_use.len(),
            "connection acquired"
        );
        Ok(PooledConnection::new(id, self.id, reused))
    }

    fn evict_expired(&self, st: &mut PoolState) -> usize {
        let Some(max_idle) = self.max_idle else {
            return 0;
        };
        let now = Instant::now();
        let before = st.idle.len();
        st.idle.retain(|c| now.duration_since(c.since) <= max_idle);
        let evicted = before - st.idle.len();
        if evicted > 0 {
            self.metrics.closed(evicted);
            tracing::debug!(pool = %self.name, evicted, "idle connections evicted");
        }
        evicted
    }
}

/// Tracks one waiting caller in the pending gauge, including cancelled waits.
struct PendingGuard<'a> {
    inner: &'a PoolInner,
}

impl<'a> PendingGuard<'a> {
    fn enter(inner: &'a PoolInner) -> Self {
        let mut st = inner.lock();
        st.pending += 1;
        inner.metrics.publish(st.usage());
        Self { inner }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.inner.lock();
        st.pending = st.pending.saturating_sub(1);
        self.inner.metrics.publish(st.usage());
    }
}
