//! In-memory store implementation.

use std::sync::Arc;

use async_trait::async_trait;
use faultline_core::{CallRecord, CoreError, CoreResult, Run, RunId};
use tokio::sync::RwLock;

use crate::store::{ClearedCounts, HarnessStore, RunPage};

#[derive(Default)]
struct StoreState {
    runs: Vec<Run>,
    calls: Vec<CallRecord>,
}

/// Store keeping everything in process memory.
///
/// Suits the harness's lifetime model: a crash loses in-flight run
/// state by design, so nothing here needs to survive a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HarnessStore for MemoryStore {
    async fn create_run(&self, run: Run) -> CoreResult<Run> {
        let mut state = self.state.write().await;
        if state.runs.iter().any(|r| r.id == run.id) {
            return Err(CoreError::AlreadyExists {
                kind: "Run".to_string(),
                id: run.id.to_string(),
            });
        }
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: RunId) -> CoreResult<Option<Run>> {
        let state = self.state.read().await;
        Ok(state.runs.iter().find(|r| r.id == id).cloned())
    }

    async fn update_run(&self, run: Run) -> CoreResult<Run> {
        let mut state = self.state.write().await;
        match state.runs.iter_mut().find(|r| r.id == run.id) {
            Some(slot) => {
                *slot = run.clone();
                Ok(run)
            }
            None => Err(CoreError::NotFound {
                kind: "Run".to_string(),
                id: run.id.to_string(),
            }),
        }
    }

    async fn list_runs(&self, page: u32, page_size: u32) -> CoreResult<RunPage> {
        let state = self.state.read().await;
        let total = state.runs.len() as u64;

        // Newest first; insertion order breaks ties between equal
        // start times.
        let mut indexed: Vec<(usize, &Run)> = state.runs.iter().enumerate().collect();
        indexed.sort_by(|(seq_a, a), (seq_b, b)| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| seq_b.cmp(seq_a))
        });

        let page = page.max(1);
        let skip = (page as usize - 1) * page_size as usize;
        let items = indexed
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .map(|(_, run)| run.clone())
            .collect();

        Ok(RunPage {
            items,
            total,
            page,
            page_size,
        })
    }

    async fn insert_call(&self, call: CallRecord) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.calls.push(call);
        Ok(())
    }

    async fn insert_calls(&self, calls: Vec<CallRecord>) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.calls.extend(calls);
        Ok(())
    }

    async fn calls_for_run(&self, run_id: RunId) -> CoreResult<Vec<CallRecord>> {
        let state = self.state.read().await;
        Ok(state
            .calls
            .iter()
            .filter(|c| c.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn clear_all(&self) -> CoreResult<ClearedCounts> {
        let mut state = self.state.write().await;
        let counts = ClearedCounts {
            deleted_runs: state.runs.len() as u64,
            deleted_calls: state.calls.len() as u64,
        };
        state.runs.clear();
        state.calls.clear();
        Ok(counts)
    }
}
