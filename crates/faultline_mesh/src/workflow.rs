//! Workflow execution inside the entry service.
//!
//! Four call patterns over the two leaf services. Every downstream hop
//! gets a slice of the caller's remaining budget, floored so a hop never
//! runs with less than [`MIN_HOP_TIMEOUT_MS`] even when the caller's
//! budget is tight.

use std::sync::Mutex;

use faultline_client::{CallSpec, CorrelatedClient};
use faultline_core::{Correlation, WorkflowKind};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use crate::payload::{DownstreamCall, WorkPayload};

/// Floor for any downstream hop budget, in milliseconds
pub const MIN_HOP_TIMEOUT_MS: u64 = 150;

/// Budget reserved for the hosting service's own work, in milliseconds
pub const HOP_BUDGET_OVERHEAD_MS: u64 = 200;

/// The two downstream targets of the entry service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamTargets {
    /// First leaf (B)
    pub first: String,
    /// Second leaf (C)
    pub second: String,
}

impl DownstreamTargets {
    /// Create a target pair
    #[must_use]
    pub fn new(first: &str, second: &str) -> Self {
        Self {
            first: first.to_string(),
            second: second.to_string(),
        }
    }
}

/// Per-hop timeout budget derived from the caller's total budget
#[must_use]
pub fn downstream_timeout_ms(total_timeout_ms: u64, workflow: WorkflowKind) -> u64 {
    let budget = total_timeout_ms.saturating_sub(HOP_BUDGET_OVERHEAD_MS) / workflow.max_hops();
    budget.max(MIN_HOP_TIMEOUT_MS)
}

/// Execute the workflow's downstream calls and report each hop.
///
/// The `random` pattern draws its call count and targets from the
/// service's RNG so runs are reproducible under a seeded harness.
pub async fn run_workflow(
    client: &CorrelatedClient,
    workflow: WorkflowKind,
    targets: &DownstreamTargets,
    payload: &WorkPayload,
    correlation: Correlation,
    hop_timeout_ms: u64,
    rng: &Mutex<ChaCha8Rng>,
) -> Vec<DownstreamCall> {
    let mut forwarded = payload.clone();
    forwarded.workflow = Some(workflow);
    let body = serde_json::to_value(&forwarded).unwrap_or(serde_json::Value::Null);

    let mut downstream = Vec::new();

    match workflow {
        WorkflowKind::Chain => {
            let first = client
                .call(
                    CallSpec::post(&targets.first, "/work", hop_timeout_ms, correlation)
                        .with_body(body.clone()),
                )
                .await;
            let first_call_id = first.call_id;
            downstream.push(DownstreamCall {
                service: targets.first.clone(),
                result: first,
            });

            let second = client
                .call(
                    CallSpec::post(&targets.second, "/work", hop_timeout_ms, correlation)
                        .with_body(body)
                        .with_parent(first_call_id),
                )
                .await;
            downstream.push(DownstreamCall {
                service: targets.second.clone(),
                result: second,
            });
        }
        WorkflowKind::Fanout | WorkflowKind::FanoutFanin => {
            let (first, second) = tokio::join!(
                client.call(
                    CallSpec::post(&targets.first, "/work", hop_timeout_ms, correlation)
                        .with_body(body.clone()),
                ),
                client.call(
                    CallSpec::post(&targets.second, "/work", hop_timeout_ms, correlation)
                        .with_body(body.clone()),
                ),
            );
            downstream.push(DownstreamCall {
                service: targets.first.clone(),
                result: first,
            });
            downstream.push(DownstreamCall {
                service: targets.second.clone(),
                result: second,
            });

            if workflow == WorkflowKind::FanoutFanin {
                let join = client
                    .call(
                        CallSpec::post(&targets.first, "/work", hop_timeout_ms, correlation)
                            .with_body(json!({"data": {"join": true}})),
                    )
                    .await;
                downstream.push(DownstreamCall {
                    service: format!("{}-join", targets.first),
                    result: join,
                });
            }
        }
        WorkflowKind::Random => {
            let count: u32 = {
                let mut rng = rng.lock().unwrap();
                1 + rng.gen_range(0..3)
            };
            for _ in 0..count {
                let pick_first = {
                    let mut rng = rng.lock().unwrap();
                    rng.gen_range(0..2) == 0
                };
                let target = if pick_first {
                    &targets.first
                } else {
                    &targets.second
                };
                let result = client
                    .call(
                        CallSpec::post(target, "/work", hop_timeout_ms, correlation)
                            .with_body(body.clone()),
                    )
                    .await;
                downstream.push(DownstreamCall {
                    service: target.clone(),
                    result,
                });
            }
        }
    }

    downstream
}
