use std::fmt;

/// Lifecycle of one pooled connection.
///
/// `Idle -> InUse -> Idle` on reuse, `Idle | InUse -> Closed` on eviction or
/// shutdown. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    InUse,
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::InUse => "in_use",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle to a connection lent out by a [`ConnectionPool`](super::ConnectionPool).
///
/// Not clonable: the holder is the only party that can hand it back.
#[derive(Debug, PartialEq, Eq)]
pub struct PooledConnection {
    id: u64,
    pool_id: u64,
    reused: bool,
}

impl PooledConnection {
    pub(crate) fn new(id: u64, pool_id: u64, reused: bool) -> Self {
        Self { id, pool_id, reused }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// A handle the caller holds is always lent out.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::InUse
    }

    /// Whether this connection was idle in the pool before this checkout.
    pub fn is_reused(&self) -> bool {
        self.reused
    }
}
