use poolmeter_core::error::Result;

use super::connection::PooledConnection;
use super::provider::ConnectionPool;

/// A lent connection that returns itself to the pool on drop.
///
/// Covers every exit path of the holder, including early returns, errors and
/// cancellation of the surrounding future.
#[derive(Debug)]
pub struct ConnectionLease {
    pool: ConnectionPool,
    conn: PooledConnection,
    released: bool,
}

impl ConnectionLease {
    pub(crate) fn new(pool: ConnectionPool, conn: PooledConnection) -> Self {
        Self {
            pool,
            conn,
            released: false,
        }
    }

    pub fn connection(&self) -> &PooledConnection {
        &self.conn
    }

    /// Release now and observe the outcome instead of leaving it to `Drop`.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.pool.release_ref(&self.conn)
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.pool.release_ref(&self.conn) {
            tracing::debug!(
                pool = %self.pool.name(),
                conn_id = self.conn.id(),
                error = %e,
                "lease release on drop failed"
            );
        }
    }
}
