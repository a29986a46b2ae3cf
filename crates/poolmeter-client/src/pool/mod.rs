//! Bounded connection pool with synchronously published utilization gauges.

mod connection;
mod lease;
pub mod metrics;
mod provider;

pub use connection::{ConnectionState, PooledConnection};
pub use lease::ConnectionLease;
pub use provider::ConnectionPool;
