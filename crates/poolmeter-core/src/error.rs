//! Shared error type across poolmeter crates.

use std::time::Duration;

use thiserror::Error;

use crate::metrics::{MetricId, MetricKind};

/// Boxed transport failure carried by [`PoolMeterError::RequestFailed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable error codes (safe to match on, log, or assert against).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    DuplicateMetric,
    WrongMetricKind,
    UnknownMetric,
    InvalidValue,
    PoolExhausted,
    InvalidRelease,
    PoolClosed,
    RequestFailed,
    BadConfig,
    UnsupportedVersion,
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and test assertions.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateMetric => "DUPLICATE_METRIC",
            ErrorCode::WrongMetricKind => "WRONG_METRIC_KIND",
            ErrorCode::UnknownMetric => "UNKNOWN_METRIC",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::PoolExhausted => "POOL_EXHAUSTED",
            ErrorCode::InvalidRelease => "INVALID_RELEASE",
            ErrorCode::PoolClosed => "POOL_CLOSED",
            ErrorCode::RequestFailed => "REQUEST_FAILED",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PoolMeterError>;

/// Unified error type used by the registry, the pool and the client facade.
#[derive(Debug, Error)]
pub enum PoolMeterError {
    #[error("metric {id} already registered as {existing}, requested {requested}")]
    DuplicateMetric {
        id: MetricId,
        existing: MetricKind,
        requested: MetricKind,
    },
    #[error("metric {id} is a {actual}, expected {expected}")]
    WrongMetricKind {
        id: MetricId,
        actual: MetricKind,
        expected: MetricKind,
    },
    #[error("unknown metric: {0}")]
    UnknownMetric(MetricId),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("pool exhausted: no connection within {timeout:?}")]
    PoolExhausted { timeout: Duration },
    #[error("invalid release: {0}")]
    InvalidRelease(String),
    #[error("pool closed")]
    PoolClosed,
    #[error("request failed: {cause}")]
    RequestFailed {
        #[source]
        cause: BoxError,
    },
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl PoolMeterError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PoolMeterError::DuplicateMetric { .. } => ErrorCode::DuplicateMetric,
            PoolMeterError::WrongMetricKind { .. } => ErrorCode::WrongMetricKind,
            PoolMeterError::UnknownMetric(_) => ErrorCode::UnknownMetric,
            PoolMeterError::InvalidValue(_) => ErrorCode::InvalidValue,
            PoolMeterError::PoolExhausted { .. } => ErrorCode::PoolExhausted,
            PoolMeterError::InvalidRelease(_) => ErrorCode::InvalidRelease,
            PoolMeterError::PoolClosed => ErrorCode::PoolClosed,
            PoolMeterError::RequestFailed { .. } => ErrorCode::RequestFailed,
            PoolMeterError::BadConfig(_) => ErrorCode::BadConfig,
            PoolMeterError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            PoolMeterError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Wrap an underlying transport failure.
    pub fn request_failed(cause: impl Into<BoxError>) -> Self {
        PoolMeterError::RequestFailed {
            cause: cause.into(),
        }
    }
}
