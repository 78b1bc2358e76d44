//! Correlation context propagated across hops.
//!
//! Every hop carries the originating request id plus the ids needed to
//! reconstruct causality. The context travels unchanged down the call
//! chain except that the caller's `call_id` becomes the next hop's
//! `parent_call_id`.

use serde::{Deserialize, Serialize};

use crate::id::{CallId, RequestId, RunId};

/// Correlation metadata attached to every transport request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    /// Request identifier, generated at the edge if absent
    pub request_id: RequestId,
    /// Owning run, when the hop belongs to a run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Identifier of the call that produced this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    /// Parent of `call_id` in the call tree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_call_id: Option<CallId>,
}

impl Correlation {
    /// Create a fresh context with a new request id
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            run_id: None,
            call_id: None,
            parent_call_id: None,
        }
    }

    /// Create a context rooted at a run's root call
    #[must_use]
    pub fn for_run(request_id: RequestId, run_id: RunId, root_call_id: CallId) -> Self {
        Self {
            request_id,
            run_id: Some(run_id),
            call_id: Some(root_call_id),
            parent_call_id: None,
        }
    }

    /// Derive the context for an outgoing hop: the hop's own call id is
    /// attached and the parent defaults to this context's call id unless
    /// the caller names an explicit parent.
    #[must_use]
    pub fn hop(&self, call_id: CallId, parent_call_id: Option<CallId>) -> Self {
        Self {
            request_id: self.request_id,
            run_id: self.run_id,
            call_id: Some(call_id),
            parent_call_id: parent_call_id.or(self.call_id),
        }
    }
}

impl Default for Correlation {
    fn default() -> Self {
        Self::new()
    }
}
