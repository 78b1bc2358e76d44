//! Store trait for run and call records.

use async_trait::async_trait;
use faultline_core::{CallRecord, CoreResult, Run, RunId};
use serde::{Deserialize, Serialize};

/// One page of runs, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPage {
    /// Runs on this page
    pub items: Vec<Run>,
    /// Total run count across all pages
    pub total: u64,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub page_size: u32,
}

/// Result of an atomic clear-all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedCounts {
    /// Runs deleted
    pub deleted_runs: u64,
    /// Calls deleted
    pub deleted_calls: u64,
}

/// Durable store for run and call records.
///
/// The engine treats persistence as an external collaborator: any
/// backend satisfying this trait can sit behind the coordinator. Calls
/// are append-only; runs are mutated only by the coordinator.
#[async_trait]
pub trait HarnessStore: Send + Sync {
    /// Persist a new run
    async fn create_run(&self, run: Run) -> CoreResult<Run>;

    /// Fetch a run by id
    async fn get_run(&self, id: RunId) -> CoreResult<Option<Run>>;

    /// Replace a run record
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the run does not exist
    async fn update_run(&self, run: Run) -> CoreResult<Run>;

    /// List runs ordered by start time descending
    async fn list_runs(&self, page: u32, page_size: u32) -> CoreResult<RunPage>;

    /// Append one call record
    async fn insert_call(&self, call: CallRecord) -> CoreResult<()>;

    /// Append a batch of call records
    async fn insert_calls(&self, calls: Vec<CallRecord>) -> CoreResult<()>;

    /// All calls of a run in insertion order
    async fn calls_for_run(&self, run_id: RunId) -> CoreResult<Vec<CallRecord>>;

    /// Delete all runs and calls in one atomic unit
    async fn clear_all(&self) -> CoreResult<ClearedCounts>;
}
