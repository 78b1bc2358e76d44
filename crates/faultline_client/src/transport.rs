//! Transport seam between the client and the simulated services.

use async_trait::async_trait;
use faultline_core::Correlation;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// One request handed to a transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Destination service name
    pub target: String,
    /// Route on the destination
    pub route: String,
    /// HTTP method
    pub method: String,
    /// JSON body, if any
    pub body: Option<Value>,
    /// Correlation metadata for this hop
    pub correlation: Correlation,
    /// Cancelled when the caller gives up on the call
    pub cancel: CancellationToken,
}

/// Response produced by a transport
#[derive(Debug, Clone, PartialEq)]
pub struct TransportReply {
    /// Status code
    pub status: u16,
    /// Parsed JSON body; `None` when the body was absent or unparseable
    pub body: Option<Value>,
}

impl TransportReply {
    /// A 200 reply with a JSON body
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    /// A reply with the given status and body
    #[must_use]
    pub fn with_status(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }
}

/// Transport-level failures; everything here maps to an error outcome,
/// never a panic
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Destination name resolves to nothing
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// Destination refused the connection
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The in-flight call observed its cancellation token
    #[error("call aborted")]
    Aborted,

    /// Any other transport failure
    #[error("transport failure: {0}")]
    Other(String),
}

/// Performs one network call against a named service.
///
/// Implementations must honor the request's cancellation token while
/// waiting; a transport that ignores it is what the client's hard
/// timeout guards against.
#[async_trait]
pub trait ServiceTransport: Send + Sync {
    /// Send a request and wait for its reply
    async fn send(&self, request: TransportRequest) -> Result<TransportReply, TransportError>;
}
