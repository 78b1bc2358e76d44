//! Correlated call execution.
//!
//! One invocation produces exactly one outcome. The call is raced
//! against a soft timeout at the caller's budget (cancels the in-flight
//! request) and a hard timeout one second later, guarding against
//! transports that ignore cancellation.

use std::sync::Arc;
use std::time::Instant;

use faultline_core::{CallId, Correlation, ErrorType};
use serde_json::Value;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::outcome::CallOutcome;
use crate::transport::{ServiceTransport, TransportError, TransportReply, TransportRequest};

/// Extra patience after the soft timeout before giving up entirely, in
/// milliseconds
pub const HARD_TIMEOUT_MARGIN_MS: u64 = 1000;

/// Specification of one call
#[derive(Debug, Clone)]
pub struct CallSpec {
    /// Destination service name
    pub target: String,
    /// Route on the destination
    pub route: String,
    /// HTTP method
    pub method: String,
    /// JSON body, if any
    pub body: Option<Value>,
    /// Soft timeout for this call in milliseconds
    pub timeout_ms: u64,
    /// Caller's correlation context
    pub correlation: Correlation,
    /// Explicit parent call; defaults to the caller's own call id
    pub parent_call_id: Option<CallId>,
}

impl CallSpec {
    /// A POST call with no body and no explicit parent
    #[must_use]
    pub fn post(target: &str, route: &str, timeout_ms: u64, correlation: Correlation) -> Self {
        Self {
            target: target.to_string(),
            route: route.to_string(),
            method: "POST".to_string(),
            body: None,
            timeout_ms,
            correlation,
            parent_call_id: None,
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Name an explicit parent call
    #[must_use]
    pub fn with_parent(mut self, parent: CallId) -> Self {
        self.parent_call_id = Some(parent);
        self
    }
}

/// Client that performs correlated calls through a transport
#[derive(Clone)]
pub struct CorrelatedClient {
    transport: Arc<dyn ServiceTransport>,
}

impl CorrelatedClient {
    /// Create a client over a transport
    #[must_use]
    pub fn new(transport: Arc<dyn ServiceTransport>) -> Self {
        Self { transport }
    }

    /// Perform one call and classify its outcome.
    ///
    /// A fresh call id is generated per invocation and propagated in the
    /// hop's correlation; the parent defaults to the caller's call id.
    pub async fn call(&self, spec: CallSpec) -> CallOutcome {
        let call_id = CallId::new();
        let correlation = spec.correlation.hop(call_id, spec.parent_call_id);
        let cancel = CancellationToken::new();
        let request = TransportRequest {
            target: spec.target.clone(),
            route: spec.route.clone(),
            method: spec.method.clone(),
            body: spec.body.clone(),
            correlation,
            cancel: cancel.clone(),
        };

        let started = Instant::now();
        let mut send = self.transport.send(request);

        tokio::select! {
            reply = &mut send => classify(call_id, reply, &started),
            () = tokio::time::sleep(Duration::from_millis(spec.timeout_ms)) => {
                cancel.cancel();
                // Soft deadline passed; give the transport the remaining
                // margin to observe the cancellation before declaring a
                // hard timeout.
                let margin = Duration::from_millis(HARD_TIMEOUT_MARGIN_MS);
                match tokio::time::timeout(margin, &mut send).await {
                    Ok(_) => CallOutcome::timeout(
                        call_id,
                        elapsed_ms(&started),
                        format!("timeout after {}ms", spec.timeout_ms),
                    ),
                    Err(_) => CallOutcome::timeout(
                        call_id,
                        elapsed_ms(&started),
                        format!(
                            "hard timeout after {}ms",
                            spec.timeout_ms + HARD_TIMEOUT_MARGIN_MS
                        ),
                    ),
                }
            }
        }
    }

    /// Perform a call with up to `retries` extra attempts and a fixed
    /// backoff pause between attempts. Stops at the first success; the
    /// last attempt's outcome is returned either way.
    pub async fn call_with_retry(&self, spec: CallSpec, retries: u32, backoff_ms: u64) -> CallOutcome {
        let mut attempt = 0;
        loop {
            let outcome = self.call(spec.clone()).await;
            if outcome.ok || attempt == retries {
                return outcome;
            }
            attempt += 1;
            debug!(
                target_service = %spec.target,
                attempt,
                retries,
                "retrying failed call"
            );
            if backoff_ms > 0 {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

fn elapsed_ms(started: &Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn classify(
    call_id: CallId,
    reply: Result<TransportReply, TransportError>,
    started: &Instant,
) -> CallOutcome {
    let duration_ms = elapsed_ms(started);
    match reply {
        Ok(reply) if (200..300).contains(&reply.status) => {
            CallOutcome::success(call_id, reply.status, duration_ms, reply.body)
        }
        Ok(reply) => CallOutcome::http_error(call_id, reply.status, duration_ms, reply.body),
        Err(err @ (TransportError::UnknownService(_) | TransportError::ConnectionRefused(_))) => {
            CallOutcome::failure(call_id, duration_ms, ErrorType::Network, err.to_string())
        }
        Err(err) => CallOutcome::failure(call_id, duration_ms, ErrorType::Unknown, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedTransport {
        reply: Result<TransportReply, TransportError>,
        calls: AtomicU32,
    }

    impl FixedTransport {
        fn new(reply: Result<TransportReply, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ServiceTransport for FixedTransport {
        async fn send(&self, _request: TransportRequest) -> Result<TransportReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    /// Sleeps forever; honors the cancellation token only when asked to
    struct StallingTransport {
        honors_cancel: bool,
    }

    #[async_trait]
    impl ServiceTransport for StallingTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportReply, TransportError> {
            if self.honors_cancel {
                tokio::select! {
                    () = request.cancel.cancelled() => Err(TransportError::Aborted),
                    () = tokio::time::sleep(Duration::from_secs(3600)) => unreachable!(),
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::Aborted)
            }
        }
    }

    fn spec(timeout_ms: u64) -> CallSpec {
        CallSpec::post("alpha", "/work", timeout_ms, Correlation::new())
    }

    #[tokio::test]
    async fn test_success_classification() {
        let transport = FixedTransport::new(Ok(TransportReply::ok(serde_json::json!({"ok": true}))));
        let client = CorrelatedClient::new(transport);
        let outcome = client.call(spec(1000)).await;
        assert!(outcome.ok);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.data.is_some());
    }

    #[tokio::test]
    async fn test_non_2xx_is_http_error() {
        let transport = FixedTransport::new(Ok(TransportReply::with_status(
            503,
            serde_json::json!({"ok": false}),
        )));
        let client = CorrelatedClient::new(transport);
        let outcome = client.call(spec(1000)).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.status_code, Some(503));
        assert_eq!(outcome.error_type, Some(ErrorType::HttpError));
        assert_eq!(outcome.error_message.as_deref(), Some("HTTP 503"));
        // A failed hop still carries whatever body came back
        assert!(outcome.data.is_some());
    }

    #[tokio::test]
    async fn test_missing_body_keeps_ok() {
        let transport = FixedTransport::new(Ok(TransportReply {
            status: 200,
            body: None,
        }));
        let client = CorrelatedClient::new(transport);
        let outcome = client.call(spec(1000)).await;
        assert!(outcome.ok);
        assert!(outcome.data.is_none());
    }

    #[tokio::test]
    async fn test_unknown_service_is_network_error() {
        let transport = FixedTransport::new(Err(TransportError::UnknownService("delta".to_string())));
        let client = CorrelatedClient::new(transport);
        let outcome = client.call(spec(1000)).await;
        assert_eq!(outcome.error_type, Some(ErrorType::Network));
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_timeout() {
        let client = CorrelatedClient::new(Arc::new(StallingTransport { honors_cancel: true }));
        let outcome = client.call(spec(500)).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.error_type, Some(ErrorType::Timeout));
        assert_eq!(outcome.error_message.as_deref(), Some("timeout after 500ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_timeout_when_cancel_ignored() {
        let client = CorrelatedClient::new(Arc::new(StallingTransport {
            honors_cancel: false,
        }));
        let outcome = client.call(spec(500)).await;
        assert_eq!(outcome.error_type, Some(ErrorType::Timeout));
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("hard timeout after 1500ms")
        );
    }

    #[tokio::test]
    async fn test_fresh_call_id_per_invocation() {
        let transport = FixedTransport::new(Ok(TransportReply::ok(serde_json::json!({}))));
        let client = CorrelatedClient::new(transport);
        let first = client.call(spec(1000)).await;
        let second = client.call(spec(1000)).await;
        assert_ne!(first.call_id, second.call_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_attempts() {
        let transport = FixedTransport::new(Ok(TransportReply::with_status(
            500,
            serde_json::json!({"ok": false}),
        )));
        let client = CorrelatedClient::new(transport.clone());
        let outcome = client.call_with_retry(spec(1000), 2, 100).await;
        assert!(!outcome.ok);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.error_type, Some(ErrorType::HttpError));
    }

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let transport = FixedTransport::new(Ok(TransportReply::ok(serde_json::json!({}))));
        let client = CorrelatedClient::new(transport.clone());
        let outcome = client.call_with_retry(spec(1000), 5, 10).await;
        assert!(outcome.ok);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retries_single_attempt() {
        let transport = FixedTransport::new(Ok(TransportReply::with_status(
            500,
            serde_json::json!({}),
        )));
        let client = CorrelatedClient::new(transport.clone());
        let _ = client.call_with_retry(spec(1000), 0, 0).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
