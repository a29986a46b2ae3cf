use async_trait::async_trait;
use bytes::Bytes;

use poolmeter_core::error::BoxError;

use crate::pool::PooledConnection;

/// Result of one remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Remote work performed over a pooled connection.
///
/// Credentials, wire protocol and API semantics live behind this trait.
#[async_trait]
pub trait RemoteOperation: Send + Sync {
    async fn perform(&self, target: &str, conn: &PooledConnection) -> Result<Response, BoxError>;
}
