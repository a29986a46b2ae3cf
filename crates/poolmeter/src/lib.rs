//! Top-level facade crate for poolmeter.
//!
//! Re-exports the metric primitives and the pooled client so users can depend on a single crate.

pub mod core {
    pub use poolmeter_core::*;
}

pub mod client {
    pub use poolmeter_client::*;
}
