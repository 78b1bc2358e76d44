//! Wire payloads for the `/work` route.

use faultline_client::CallOutcome;
use faultline_core::WorkflowKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timeout assumed when the inbound request names none, in milliseconds
pub const DEFAULT_WORK_TIMEOUT_MS: u64 = 2000;

/// Upper bound on the echoed synthetic payload, in bytes
pub const MAX_ECHO_BYTES: usize = 2048;

/// Inbound `/work` request body.
///
/// Every field is optional; unknown fields are ignored and a malformed
/// body degrades to the defaults rather than failing the call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkPayload {
    /// Workflow the entry service should execute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowKind>,
    /// Caller's total timeout budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_timeout_ms: Option<u64>,
    /// Synthetic payload size to echo back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<u32>,
    /// Opaque caller data, echoed back on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl WorkPayload {
    /// Parse a request body, tolerating absence and malformed shapes
    #[must_use]
    pub fn parse(body: Option<&Value>) -> Self {
        body.and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    /// Effective timeout budget for this request
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.client_timeout_ms.unwrap_or(DEFAULT_WORK_TIMEOUT_MS)
    }
}

/// One downstream hop reported by the entry service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownstreamCall {
    /// Destination label (a service name, or `<service>-join` for the
    /// consolidation hop)
    pub service: String,
    /// Outcome of the hop
    pub result: CallOutcome,
}

/// Successful `/work` response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkReply {
    /// Always true on this path; failures use the error reply shape
    pub ok: bool,
    /// Responding service
    pub service: String,
    /// Echoed data or synthetic payload
    pub echo: Value,
    /// Latency injected by the chaos evaluator
    pub duration_simulated_ms: u64,
    /// Downstream hops, present only on the entry service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downstream: Option<Vec<DownstreamCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_none_is_default() {
        let payload = WorkPayload::parse(None);
        assert_eq!(payload, WorkPayload::default());
        assert_eq!(payload.timeout_ms(), DEFAULT_WORK_TIMEOUT_MS);
    }

    #[test]
    fn test_parse_full_body() {
        let body = serde_json::json!({
            "workflow": "fanout",
            "clientTimeoutMs": 900,
            "payloadSize": 128,
            "data": {"iteration": 3}
        });
        let payload = WorkPayload::parse(Some(&body));
        assert_eq!(payload.workflow, Some(WorkflowKind::Fanout));
        assert_eq!(payload.timeout_ms(), 900);
        assert_eq!(payload.payload_size, Some(128));
    }

    #[test]
    fn test_parse_malformed_degrades_to_default() {
        let body = serde_json::json!({"workflow": 17});
        let payload = WorkPayload::parse(Some(&body));
        assert_eq!(payload, WorkPayload::default());
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let body = serde_json::json!({"clientTimeoutMs": 300, "extra": true});
        let payload = WorkPayload::parse(Some(&body));
        assert_eq!(payload.timeout_ms(), 300);
    }

    #[test]
    fn test_work_reply_wire_format() {
        let reply = WorkReply {
            ok: true,
            service: "beta".to_string(),
            echo: Value::Null,
            duration_simulated_ms: 40,
            downstream: None,
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value.get("durationSimulatedMs").unwrap(), 40);
        assert!(value.get("downstream").is_none());
    }
}
