//! Call outcome classification.

use faultline_core::{CallId, ErrorType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal outcome of one client invocation.
///
/// Serialized into downstream payloads (and parsed back out by the run
/// coordinator), so the field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    /// Whether the call completed with a 2xx response
    pub ok: bool,
    /// Identifier generated for this hop
    pub call_id: CallId,
    /// Status code, when a response was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// End-to-end duration in milliseconds
    pub duration_ms: u64,
    /// Response body; absent when missing or unparseable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error classification, when the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// Human-readable error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CallOutcome {
    /// Successful 2xx outcome
    #[must_use]
    pub fn success(call_id: CallId, status: u16, duration_ms: u64, data: Option<Value>) -> Self {
        Self {
            ok: true,
            call_id,
            status_code: Some(status),
            duration_ms,
            data,
            error_type: None,
            error_message: None,
        }
    }

    /// Non-2xx response outcome
    #[must_use]
    pub fn http_error(call_id: CallId, status: u16, duration_ms: u64, data: Option<Value>) -> Self {
        Self {
            ok: false,
            call_id,
            status_code: Some(status),
            duration_ms,
            data,
            error_type: Some(ErrorType::HttpError),
            error_message: Some(format!("HTTP {}", status)),
        }
    }

    /// Timeout outcome (soft, hard, or synthetic)
    #[must_use]
    pub fn timeout(call_id: CallId, duration_ms: u64, message: String) -> Self {
        Self {
            ok: false,
            call_id,
            status_code: None,
            duration_ms,
            data: None,
            error_type: Some(ErrorType::Timeout),
            error_message: Some(message),
        }
    }

    /// Failure outcome with an explicit classification
    #[must_use]
    pub fn failure(call_id: CallId, duration_ms: u64, error_type: ErrorType, message: String) -> Self {
        Self {
            ok: false,
            call_id,
            status_code: None,
            duration_ms,
            data: None,
            error_type: Some(error_type),
            error_message: Some(message),
        }
    }
}
