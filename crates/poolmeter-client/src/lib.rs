//! poolmeter client library entry.
//!
//! This crate wires the bounded connection pool, the pooled client facade,
//! strict config loading and the periodic metrics reporter on top of the
//! runtime-free registry in `poolmeter-core`. It is intended to be consumed by
//! host processes and by integration tests.

pub mod config;
pub mod http;
pub mod obs;
pub mod pool;

pub use http::{HttpClient, RemoteOperation, Response};
pub use pool::{ConnectionLease, ConnectionPool, ConnectionState, PooledConnection};
