//! Progress event streaming.
//!
//! Per-run broadcast channels created lazily on first subscriber or
//! first publish, plus one long-lived global channel for cross-run
//! events. Completing a run's stream drops its sender, which ends every
//! subscriber's stream.

use std::collections::HashMap;

use faultline_core::{CallRecord, Run, RunId, RunStats};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

/// Default broadcast channel capacity
pub const DEFAULT_STREAM_CAPACITY: usize = 256;

/// JSON-encoded progress event, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// A run was submitted
    #[serde(rename = "run_created")]
    RunCreated {
        /// The new run record
        run: Run,
    },
    /// A run record changed (terminal transition or final counters)
    #[serde(rename = "run_updated")]
    RunUpdated {
        /// The updated run record
        run: Run,
    },
    /// All runs and calls were deleted
    #[serde(rename = "runs_cleared", rename_all = "camelCase")]
    RunsCleared {
        /// Runs deleted
        deleted_runs: u64,
        /// Calls deleted
        deleted_calls: u64,
    },
    /// One iteration finished and its records are durable
    #[serde(rename = "call_completed")]
    CallCompleted {
        /// Iteration index
        iteration: u32,
        /// The persisted root call
        call: CallRecord,
        /// Persisted downstream calls
        downstream: Vec<CallRecord>,
        /// Running totals snapshot
        stats: RunStats,
    },
    /// The run reached its terminal state with final statistics
    #[serde(rename = "run_completed", rename_all = "camelCase")]
    RunCompleted {
        /// The run
        run_id: RunId,
        /// Final counters
        #[serde(flatten)]
        stats: RunStats,
        /// Median latency
        p50_latency_ms: u64,
        /// 95th percentile latency
        p95_latency_ms: u64,
    },
}

/// Publish/subscribe fan-out for run progress events
pub struct StreamHub {
    capacity: usize,
    runs: RwLock<HashMap<RunId, broadcast::Sender<RunEvent>>>,
    global: broadcast::Sender<RunEvent>,
}

impl StreamHub {
    /// Create a hub with the given per-channel capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (global, _) = broadcast::channel(capacity);
        Self {
            capacity,
            runs: RwLock::new(HashMap::new()),
            global,
        }
    }

    /// Subscribe to one run's event stream, creating it if needed
    pub async fn subscribe_run(&self, run_id: RunId) -> broadcast::Receiver<RunEvent> {
        let mut runs = self.runs.write().await;
        runs.entry(run_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to the global cross-run stream
    #[must_use]
    pub fn subscribe_global(&self) -> broadcast::Receiver<RunEvent> {
        self.global.subscribe()
    }

    /// Publish an event on one run's stream, creating it if needed.
    /// Events published with no subscriber are dropped.
    pub async fn emit_run(&self, run_id: RunId, event: RunEvent) {
        let mut runs = self.runs.write().await;
        let sender = runs
            .entry(run_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        let _ = sender.send(event);
    }

    /// Publish an event on the global stream
    pub fn emit_global(&self, event: RunEvent) {
        let _ = self.global.send(event);
    }

    /// Close one run's stream; subscribers observe the end of stream
    pub async fn complete_run(&self, run_id: RunId) {
        let mut runs = self.runs.write().await;
        runs.remove(&run_id);
    }

    /// Number of open run streams
    pub async fn open_streams(&self) -> usize {
        self.runs.read().await.len()
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::{RunConfig, WorkflowKind};
    use tokio::sync::broadcast::error::RecvError;

    fn run() -> Run {
        Run::new(&RunConfig::new(WorkflowKind::Chain, 1, 1, 2000))
    }

    #[tokio::test]
    async fn test_subscriber_receives_run_event() {
        let hub = StreamHub::default();
        let run = run();
        let mut rx = hub.subscribe_run(run.id).await;

        hub.emit_run(run.id, RunEvent::RunCreated { run: run.clone() }).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event, RunEvent::RunCreated { run });
    }

    #[tokio::test]
    async fn test_emit_without_subscriber_is_dropped() {
        let hub = StreamHub::default();
        let run = run();
        hub.emit_run(run.id, RunEvent::RunCreated { run: run.clone() }).await;

        // The channel exists now but the event is gone.
        assert_eq!(hub.open_streams().await, 1);
        let mut rx = hub.subscribe_run(run.id).await;
        hub.complete_run(run.id).await;
        assert_eq!(rx.recv().await, Err(RecvError::Closed));
    }

    #[tokio::test]
    async fn test_complete_ends_stream() {
        let hub = StreamHub::default();
        let run = run();
        let mut rx = hub.subscribe_run(run.id).await;

        hub.complete_run(run.id).await;
        assert_eq!(rx.recv().await, Err(RecvError::Closed));
        assert_eq!(hub.open_streams().await, 0);
    }

    #[tokio::test]
    async fn test_global_stream_is_independent() {
        let hub = StreamHub::default();
        let run = run();
        let mut global = hub.subscribe_global();
        let mut per_run = hub.subscribe_run(run.id).await;

        hub.emit_global(RunEvent::RunsCleared {
            deleted_runs: 2,
            deleted_calls: 10,
        });

        let event = global.recv().await.unwrap();
        assert!(matches!(event, RunEvent::RunsCleared { .. }));
        assert!(per_run.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_fan_out() {
        let hub = StreamHub::default();
        let run = run();
        let mut a = hub.subscribe_run(run.id).await;
        let mut b = hub.subscribe_run(run.id).await;

        hub.emit_run(run.id, RunEvent::RunUpdated { run: run.clone() }).await;
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn test_event_wire_format() {
        let event = RunEvent::RunCompleted {
            run_id: RunId::new(),
            stats: RunStats {
                total_calls: 3,
                success_calls: 2,
                error_calls: 1,
                timeout_calls: 0,
            },
            p50_latency_ms: 12,
            p95_latency_ms: 80,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value.get("type").unwrap(), "run_completed");
        // Stats are flattened into the event payload
        assert_eq!(value.get("totalCalls").unwrap(), 3);
        assert_eq!(value.get("p95LatencyMs").unwrap(), 80);
        assert!(value.get("stats").is_none());
    }

    #[test]
    fn test_created_event_wire_format() {
        let event = RunEvent::RunCreated { run: run() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value.get("type").unwrap(), "run_created");
        assert!(value.get("run").unwrap().get("status").is_some());
    }
}
