//! Run coordination: submission, bounded worker pool, aggregation.
//!
//! `submit_run` returns as soon as the run record exists; execution
//! proceeds on the runtime. Workers pull iteration indices from one
//! shared queue, so no index is executed twice and no more than
//! `concurrency` iterations are ever in flight.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use faultline_client::{CallOutcome, CallSpec, CorrelatedClient, ServiceTransport};
use faultline_core::{
    CallId, CallRecord, CoreError, CoreResult, Correlation, ErrorType, RequestId, Run, RunConfig,
    RunId, RunStatus,
};
use faultline_store::{ClearedCounts, HarnessStore, RunPage};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::events::{RunEvent, StreamHub};
use crate::graph::{build_call_graph, CallNode};
use crate::metrics::RunTotals;

/// Coordinator wiring: where root calls go and how they are labeled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Source service recorded on root calls
    pub source_service: String,
    /// Entry service receiving root calls
    pub entry_service: String,
    /// Route invoked on the entry service
    pub work_route: String,
}

impl CoordinatorConfig {
    /// Defaults for the standard topology
    #[must_use]
    pub fn new() -> Self {
        Self {
            source_service: "orchestrator".to_string(),
            entry_service: "alpha".to_string(),
            work_route: "/work".to_string(),
        }
    }

    /// Set the entry service
    #[must_use]
    pub fn with_entry_service(mut self, name: &str) -> Self {
        self.entry_service = name.to_string();
        self
    }

    /// Set the source label
    #[must_use]
    pub fn with_source_service(mut self, name: &str) -> Self {
        self.source_service = name.to_string();
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A run with its calls and reconstructed call graph
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetail {
    /// The run record
    pub run: Run,
    /// All calls in insertion order
    pub calls: Vec<CallRecord>,
    /// Parent/child forest over those calls
    pub call_graph: Vec<CallNode>,
}

struct Inner {
    config: CoordinatorConfig,
    store: Arc<dyn HarnessStore>,
    streams: Arc<StreamHub>,
    client: CorrelatedClient,
}

/// Drives run execution and owns run bookkeeping.
///
/// Cheap to clone; clones share the same store, streams, and transport.
#[derive(Clone)]
pub struct RunCoordinator {
    inner: Arc<Inner>,
}

impl RunCoordinator {
    /// Create a coordinator over a store, a stream hub, and a transport
    #[must_use]
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn HarnessStore>,
        streams: Arc<StreamHub>,
        transport: Arc<dyn ServiceTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                streams,
                client: CorrelatedClient::new(transport),
            }),
        }
    }

    /// Event stream hub
    #[must_use]
    pub fn streams(&self) -> &Arc<StreamHub> {
        &self.inner.streams
    }

    /// Submit a run and start executing it without blocking the caller.
    ///
    /// Execution failures transition the run to `failed` and are logged,
    /// never surfaced to the submitter.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for out-of-range config fields, or
    /// a store error if the run record cannot be created.
    pub async fn submit_run(&self, config: RunConfig) -> CoreResult<RunId> {
        config.validate()?;

        let run = self.inner.store.create_run(Run::new(&config)).await?;
        let run_id = run.id;
        self.inner.streams.emit_global(RunEvent::RunCreated { run });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(err) = inner.execute_run(run_id, &config).await {
                error!(run_id = %run_id, error = %err, "run execution failed");
                inner.mark_failed(run_id).await;
            }
        });

        Ok(run_id)
    }

    /// Paginated run listing, newest first
    ///
    /// # Errors
    ///
    /// Propagates store failures
    pub async fn list_runs(&self, page: u32, page_size: u32) -> CoreResult<RunPage> {
        self.inner.store.list_runs(page, page_size).await
    }

    /// One run with its calls and call graph
    ///
    /// # Errors
    ///
    /// Propagates store failures
    pub async fn run_detail(&self, run_id: RunId) -> CoreResult<Option<RunDetail>> {
        let Some(run) = self.inner.store.get_run(run_id).await? else {
            return Ok(None);
        };
        let calls = self.inner.store.calls_for_run(run_id).await?;
        let call_graph = build_call_graph(&calls);
        Ok(Some(RunDetail {
            run,
            calls,
            call_graph,
        }))
    }

    /// Atomically delete all runs and calls, announcing the counts
    ///
    /// # Errors
    ///
    /// Propagates store failures
    pub async fn clear_runs(&self) -> CoreResult<ClearedCounts> {
        let counts = self.inner.store.clear_all().await?;
        self.inner.streams.emit_global(RunEvent::RunsCleared {
            deleted_runs: counts.deleted_runs,
            deleted_calls: counts.deleted_calls,
        });
        Ok(counts)
    }
}

impl Inner {
    async fn execute_run(&self, run_id: RunId, config: &RunConfig) -> CoreResult<()> {
        let started = Instant::now();
        let queue: Arc<Mutex<VecDeque<u32>>> =
            Arc::new(Mutex::new((0..config.iterations).collect()));
        let totals = Arc::new(Mutex::new(RunTotals::new()));

        let workers = (0..config.concurrency)
            .map(|_| self.worker(run_id, config, Arc::clone(&queue), Arc::clone(&totals)));
        for result in futures::future::join_all(workers).await {
            result?;
        }

        let (stats, p50, p95) = {
            let totals = totals.lock().await;
            let (p50, p95) = totals.percentiles();
            (totals.stats(), p50, p95)
        };

        let mut run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                kind: "Run".to_string(),
                id: run_id.to_string(),
            })?;
        run.status = RunStatus::Completed;
        run.finished_at = Some(Utc::now());
        run.stats = stats;
        run.p50_latency_ms = p50;
        run.p95_latency_ms = p95;
        let run = self.store.update_run(run).await?;

        self.streams.emit_global(RunEvent::RunUpdated { run });
        info!(
            run_id = %run_id,
            duration_ms = started.elapsed().as_millis() as u64,
            total_calls = stats.total_calls,
            success_calls = stats.success_calls,
            error_calls = stats.error_calls,
            timeout_calls = stats.timeout_calls,
            p50_latency_ms = p50,
            p95_latency_ms = p95,
            "run completed"
        );
        self.streams
            .emit_run(
                run_id,
                RunEvent::RunCompleted {
                    run_id,
                    stats,
                    p50_latency_ms: p50,
                    p95_latency_ms: p95,
                },
            )
            .await;
        self.streams.complete_run(run_id).await;
        Ok(())
    }

    async fn worker(
        &self,
        run_id: RunId,
        config: &RunConfig,
        queue: Arc<Mutex<VecDeque<u32>>>,
        totals: Arc<Mutex<RunTotals>>,
    ) -> CoreResult<()> {
        loop {
            let iteration = { queue.lock().await.pop_front() };
            let Some(iteration) = iteration else {
                return Ok(());
            };
            self.run_iteration(run_id, config, iteration, &totals).await?;
        }
    }

    /// Execute one iteration: a root call through the retry loop, raced
    /// against the iteration's hard budget, then bookkeeping.
    async fn run_iteration(
        &self,
        run_id: RunId,
        config: &RunConfig,
        iteration: u32,
        totals: &Mutex<RunTotals>,
    ) -> CoreResult<()> {
        let request_id = RequestId::new();
        let root_call_id = CallId::new();
        let correlation = Correlation::for_run(request_id, run_id, root_call_id);

        let mut body = json!({
            "workflow": config.workflow,
            "clientTimeoutMs": config.client_timeout_ms,
            "data": {"iteration": iteration},
        });
        if let Some(size) = config.payload_size {
            body["payloadSize"] = json!(size);
        }

        let spec = CallSpec::post(
            &self.config.entry_service,
            &self.config.work_route,
            config.client_timeout_ms,
            correlation,
        )
        .with_body(body);

        let budget_ms = config.iteration_budget_ms();
        let outcome = match tokio::time::timeout(
            Duration::from_millis(budget_ms),
            self.client
                .call_with_retry(spec, config.retries(), config.backoff_ms()),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(run_id = %run_id, iteration, budget_ms, "iteration exceeded hard budget");
                CallOutcome::timeout(
                    root_call_id,
                    budget_ms,
                    format!("iteration exceeded {}ms", budget_ms),
                )
            }
        };

        let root_call = CallRecord {
            id: root_call_id,
            run_id,
            parent_call_id: None,
            request_id,
            from_service: self.config.source_service.clone(),
            to_service: self.config.entry_service.clone(),
            route: self.config.work_route.clone(),
            method: "POST".to_string(),
            status_code: outcome.status_code,
            duration_ms: outcome.duration_ms,
            error_type: outcome.error_type,
            error_message: outcome.error_message.clone(),
            created_at: Utc::now(),
        };
        self.store.insert_call(root_call.clone()).await?;

        let downstream =
            self.extract_downstream(run_id, request_id, root_call_id, outcome.data.as_ref());
        if !downstream.is_empty() {
            self.store.insert_calls(downstream.clone()).await?;
        }

        let stats = {
            let mut totals = totals.lock().await;
            totals.record_root(&outcome);
            for call in &downstream {
                totals.record_downstream(call);
            }
            totals.stats()
        };

        self.streams
            .emit_run(
                run_id,
                RunEvent::CallCompleted {
                    iteration,
                    call: root_call,
                    downstream,
                    stats,
                },
            )
            .await;
        Ok(())
    }

    /// Rebuild downstream call records from the entry service's
    /// response payload. Tolerates missing or malformed entries; an
    /// unusable hop degrades to defaults instead of failing the run.
    fn extract_downstream(
        &self,
        run_id: RunId,
        request_id: RequestId,
        parent_call_id: CallId,
        data: Option<&Value>,
    ) -> Vec<CallRecord> {
        let Some(list) = data
            .and_then(|d| d.get("downstream"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        list.iter()
            .map(|item| {
                let result = item.get("result");
                let field = |key: &str| result.and_then(|r| r.get(key));

                let id = field("callId")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default();
                let to_service = item
                    .get("service")
                    .or_else(|| item.get("target"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();

                CallRecord {
                    id,
                    run_id,
                    parent_call_id: Some(parent_call_id),
                    request_id,
                    from_service: self.config.entry_service.clone(),
                    to_service,
                    route: self.config.work_route.clone(),
                    method: "POST".to_string(),
                    status_code: field("statusCode")
                        .and_then(Value::as_u64)
                        .and_then(|v| u16::try_from(v).ok()),
                    duration_ms: field("durationMs").and_then(Value::as_u64).unwrap_or(0),
                    error_type: field("errorType")
                        .and_then(Value::as_str)
                        .map(ErrorType::parse_lossy),
                    error_message: field("errorMessage")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    created_at: Utc::now(),
                }
            })
            .collect()
    }

    async fn mark_failed(&self, run_id: RunId) {
        match self.store.get_run(run_id).await {
            Ok(Some(mut run)) => {
                run.status = RunStatus::Failed;
                run.finished_at = Some(Utc::now());
                match self.store.update_run(run).await {
                    Ok(run) => self.streams.emit_global(RunEvent::RunUpdated { run }),
                    Err(err) => {
                        error!(run_id = %run_id, error = %err, "failed to persist run failure");
                    }
                }
            }
            Ok(None) => warn!(run_id = %run_id, "failed run no longer exists"),
            Err(err) => error!(run_id = %run_id, error = %err, "failed to load run for failure"),
        }
        self.streams.complete_run(run_id).await;
    }
}
