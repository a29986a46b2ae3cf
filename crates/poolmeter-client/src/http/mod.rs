//! Pooled client facade.
//!
//! Re-exports the client and the remote operation capability so downstream
//! consumers can depend on this module directly.

pub mod client;
pub mod operation;

pub use client::HttpClient;
pub use operation::{RemoteOperation, Response};
