//! poolmeter core: runtime-free metric primitives, exporters, assertions and
//! the shared error type.
//!
//! This crate carries no async runtime so the registry can be shared by the
//! pooled client, by host processes, and by tests alike.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `PoolMeterError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod error;
pub mod harness;
pub mod metrics;

/// Shared result type.
pub use error::{BoxError, ErrorCode, PoolMeterError, Result};
pub use harness::{AssertionError, MetricsAssertions};
pub use metrics::{MetricHandle, MetricId, MetricKind, MetricRegistry, MetricsExporter, Observation};
