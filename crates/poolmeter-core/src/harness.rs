//! Assertions over registry contents, for tests and health probes.

use thiserror::Error;

use crate::metrics::{MetricId, MetricKind, MetricRegistry};

/// Why an expectation did not hold.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssertionError {
    #[error("metric {0} is not registered")]
    Missing(MetricId),
    #[error("metric {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: MetricId,
        expected: MetricKind,
        actual: MetricKind,
    },
    #[error("metric {id}: expected {expected} (+/- {tolerance}), observed {observed}")]
    Mismatch {
        id: MetricId,
        expected: f64,
        observed: f64,
        tolerance: f64,
    },
}

/// Reads a registry and compares observed values against expectations.
pub struct MetricsAssertions<'a> {
    registry: &'a MetricRegistry,
}

impl<'a> MetricsAssertions<'a> {
    pub fn new(registry: &'a MetricRegistry) -> Self {
        Self { registry }
    }

    /// Fails if the gauge is absent or `|observed - expected| > tolerance`.
    pub fn expect_gauge_equals(
        &self,
        name: &str,
        tags: &[(&str, &str)],
        expected: f64,
        tolerance: f64,
    ) -> Result<(), AssertionError> {
        self.expect_equals(MetricKind::Gauge, name, tags, expected, tolerance)
    }

    pub fn expect_counter_equals(
        &self,
        name: &str,
        tags: &[(&str, &str)],
        expected: f64,
        tolerance: f64,
    ) -> Result<(), AssertionError> {
        self.expect_equals(MetricKind::Counter, name, tags, expected, tolerance)
    }

    fn expect_equals(
        &self,
        kind: MetricKind,
        name: &str,
        tags: &[(&str, &str)],
        expected: f64,
        tolerance: f64,
    ) -> Result<(), AssertionError> {
        let handle = self
            .registry
            .get(name, tags)
            .ok_or_else(|| AssertionError::Missing(MetricId::new(name, tags)))?;

        if handle.kind() != kind {
            return Err(AssertionError::WrongKind {
                id: handle.id().clone(),
                expected: kind,
                actual: handle.kind(),
            });
        }

        let observed = handle.value();
        // NaN tolerance or expectation never matches.
        if !((observed - expected).abs() <= tolerance) {
            return Err(AssertionError::Mismatch {
                id: handle.id().clone(),
                expected,
                observed,
                tolerance,
            });
        }
        Ok(())
    }
}
