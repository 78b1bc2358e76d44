//! Run and call data model.
//!
//! A `Run` is one execution of `iterations` repetitions of a workflow
//! pattern; a `CallRecord` is one recorded network hop attempt within it.
//! Both serialize as camelCase JSON, which is the wire contract of the
//! HTTP API and the event streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::id::{CallId, RequestId, RunId};

/// Safety margin added on top of the worst-case retry schedule when
/// computing the per-iteration hard budget, in milliseconds.
pub const ITERATION_SAFETY_MARGIN_MS: u64 = 3000;

/// Workflow pattern executed by the entry service on each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowKind {
    /// Call B, then C, with C parented on B's call
    #[serde(rename = "chain")]
    Chain,
    /// Call B and C concurrently
    #[serde(rename = "fanout")]
    Fanout,
    /// Fanout, then a consolidation call back to B
    #[serde(rename = "fanout-fanin")]
    FanoutFanin,
    /// 1 to 3 calls to uniformly random targets
    #[serde(rename = "random")]
    Random,
}

impl WorkflowKind {
    /// Worst-case downstream hop count, used to split the caller's budget
    #[must_use]
    pub const fn max_hops(&self) -> u64 {
        match self {
            WorkflowKind::Chain | WorkflowKind::Fanout => 2,
            WorkflowKind::FanoutFanin | WorkflowKind::Random => 3,
        }
    }

    /// Wire name of the workflow
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Chain => "chain",
            WorkflowKind::Fanout => "fanout",
            WorkflowKind::FanoutFanin => "fanout-fanin",
            WorkflowKind::Random => "random",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run lifecycle status; progression is append-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Workers are executing iterations
    Running,
    /// All iterations finished and aggregates are final
    Completed,
    /// Run bookkeeping failed; aggregates may be partial
    Failed,
}

impl RunStatus {
    /// Whether the run has reached a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Classification of a failed call outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Valid response with a non-2xx status
    HttpError,
    /// Soft, hard, or iteration-budget timeout
    Timeout,
    /// Transport-level failure
    Network,
    /// Anything uncaught
    Unknown,
}

impl ErrorType {
    /// Parse a wire name, tolerating unrecognized values as `Unknown`
    #[must_use]
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "http_error" => ErrorType::HttpError,
            "timeout" => ErrorType::Timeout,
            "network" => ErrorType::Network,
            _ => ErrorType::Unknown,
        }
    }
}

/// Retry policy applied to the root hop of each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Extra attempts after the first (0-5)
    pub retries: u32,
    /// Fixed pause between attempts in milliseconds (0-5000)
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error naming the offending field
    pub fn validate(&self) -> CoreResult<()> {
        if self.retries > 5 {
            return Err(CoreError::Validation {
                field: "retryPolicy.retries".to_string(),
                reason: "must be between 0 and 5".to_string(),
            });
        }
        if self.backoff_ms > 5000 {
            return Err(CoreError::Validation {
                field: "retryPolicy.backoffMs".to_string(),
                reason: "must be between 0 and 5000".to_string(),
            });
        }
        Ok(())
    }
}

/// Run submission config, validated before the engine sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Workflow pattern to execute
    pub workflow: WorkflowKind,
    /// Number of iterations (1-1000)
    pub iterations: u32,
    /// Worker pool size (1-100)
    pub concurrency: u32,
    /// Optional synthetic payload size in bytes (0-10240)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<u32>,
    /// Per-call client timeout in milliseconds (100-20000)
    pub client_timeout_ms: u64,
    /// Optional retry policy for the root hop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

impl RunConfig {
    /// Create a config with no payload and no retries
    #[must_use]
    pub fn new(workflow: WorkflowKind, iterations: u32, concurrency: u32, client_timeout_ms: u64) -> Self {
        Self {
            workflow,
            iterations,
            concurrency,
            payload_size: None,
            client_timeout_ms,
            retry_policy: None,
        }
    }

    /// Set payload size
    #[must_use]
    pub fn with_payload_size(mut self, size: u32) -> Self {
        self.payload_size = Some(size);
        self
    }

    /// Set retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retries: u32, backoff_ms: u64) -> Self {
        self.retry_policy = Some(RetryPolicy { retries, backoff_ms });
        self
    }

    /// Extra attempts after the first, defaulting to 0
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retry_policy.map_or(0, |p| p.retries)
    }

    /// Backoff between attempts, defaulting to 0
    #[must_use]
    pub fn backoff_ms(&self) -> u64 {
        self.retry_policy.map_or(0, |p| p.backoff_ms)
    }

    /// Hard ceiling for one iteration: the worst-case retry schedule plus
    /// a fixed safety margin
    #[must_use]
    pub fn iteration_budget_ms(&self) -> u64 {
        let retries = u64::from(self.retries());
        (retries + 1) * self.client_timeout_ms + retries * self.backoff_ms() + ITERATION_SAFETY_MARGIN_MS
    }

    /// Validate all field ranges
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error naming the first offending field
    pub fn validate(&self) -> CoreResult<()> {
        if self.iterations < 1 || self.iterations > 1000 {
            return Err(CoreError::Validation {
                field: "iterations".to_string(),
                reason: "must be between 1 and 1000".to_string(),
            });
        }
        if self.concurrency < 1 || self.concurrency > 100 {
            return Err(CoreError::Validation {
                field: "concurrency".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }
        if let Some(size) = self.payload_size {
            if size > 10240 {
                return Err(CoreError::Validation {
                    field: "payloadSize".to_string(),
                    reason: "must be between 0 and 10240".to_string(),
                });
            }
        }
        if self.client_timeout_ms < 100 || self.client_timeout_ms > 20000 {
            return Err(CoreError::Validation {
                field: "clientTimeoutMs".to_string(),
                reason: "must be between 100 and 20000".to_string(),
            });
        }
        if let Some(policy) = &self.retry_policy {
            policy.validate()?;
        }
        Ok(())
    }
}

/// Aggregate call counters for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Calls recorded so far
    pub total_calls: u64,
    /// Calls that completed successfully
    pub success_calls: u64,
    /// Calls that completed with any error
    pub error_calls: u64,
    /// Subset of errors classified as timeouts
    pub timeout_calls: u64,
}

/// One execution of an iteration set with aggregate statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Run identifier
    pub id: RunId,
    /// Workflow pattern
    pub workflow: WorkflowKind,
    /// Lifecycle status
    pub status: RunStatus,
    /// Requested iteration count
    pub iterations: u32,
    /// Worker pool size
    pub concurrency: u32,
    /// Synthetic payload size, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<u32>,
    /// Per-call client timeout
    pub client_timeout_ms: u64,
    /// Extra attempts after the first
    pub retries: u32,
    /// Pause between attempts
    pub backoff_ms: u64,
    /// Submission time
    pub started_at: DateTime<Utc>,
    /// Time the run reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Aggregate counters, final once terminal
    #[serde(flatten)]
    pub stats: RunStats,
    /// Median latency over recorded durations
    pub p50_latency_ms: u64,
    /// 95th percentile latency over recorded durations
    pub p95_latency_ms: u64,
}

impl Run {
    /// Create a new run in `running` state from a validated config
    #[must_use]
    pub fn new(config: &RunConfig) -> Self {
        Self {
            id: RunId::new(),
            workflow: config.workflow,
            status: RunStatus::Running,
            iterations: config.iterations,
            concurrency: config.concurrency,
            payload_size: config.payload_size,
            client_timeout_ms: config.client_timeout_ms,
            retries: config.retries(),
            backoff_ms: config.backoff_ms(),
            started_at: Utc::now(),
            finished_at: None,
            stats: RunStats::default(),
            p50_latency_ms: 0,
            p95_latency_ms: 0,
        }
    }
}

/// One recorded network hop attempt with timing and outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Call identifier
    pub id: CallId,
    /// Owning run
    pub run_id: RunId,
    /// Parent call; determines the call's position in the call tree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_call_id: Option<CallId>,
    /// Correlation request identifier
    pub request_id: RequestId,
    /// Source service
    pub from_service: String,
    /// Destination service
    pub to_service: String,
    /// Route invoked on the destination
    pub route: String,
    /// HTTP method
    pub method: String,
    /// Status code, when a response was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// End-to-end duration in milliseconds
    pub duration_ms: u64,
    /// Error classification, when the hop failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// Human-readable error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Record creation time
    pub created_at: DateTime<Utc>,
}

impl CallRecord {
    /// Whether the hop completed without error
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_type.is_none()
            && self
                .status_code
                .is_none_or(|code| (200..400).contains(&code))
    }
}
