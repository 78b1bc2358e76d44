//! One simulated service: chaos application, then work.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use faultline_chaos::{evaluate_chaos, ChaosCell, HarnessSeed};
use faultline_client::{CorrelatedClient, TransportError, TransportReply, TransportRequest};
use faultline_core::WorkflowKind;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::mesh::ServiceMesh;
use crate::payload::{WorkPayload, WorkReply};
use crate::workflow::{downstream_timeout_ms, run_workflow, DownstreamTargets};

/// Extra stall beyond the caller's budget under `timeout` mode, in
/// milliseconds
pub const STALL_EXTRA_MS: u64 = 1500;

/// A simulated downstream service.
///
/// Every inbound call first runs the chaos evaluator against the
/// service's current configuration; only then does the service do its
/// work. The entry service additionally executes the requested workflow
/// against its two leaf targets.
pub struct SimulatedService {
    name: String,
    chaos: ChaosCell,
    rng: Arc<Mutex<ChaCha8Rng>>,
    downstream: Option<DownstreamTargets>,
}

impl SimulatedService {
    /// Create a leaf service: chaos handling plus echo
    #[must_use]
    pub fn leaf(name: &str, seed: &HarnessSeed) -> Self {
        Self {
            name: name.to_string(),
            chaos: ChaosCell::new(name),
            rng: Arc::new(Mutex::new(seed.derive(name).rng())),
            downstream: None,
        }
    }

    /// Create the entry service: chaos handling plus workflow execution
    #[must_use]
    pub fn entry(name: &str, seed: &HarnessSeed, targets: DownstreamTargets) -> Self {
        Self {
            name: name.to_string(),
            chaos: ChaosCell::new(name),
            rng: Arc::new(Mutex::new(seed.derive(name).rng())),
            downstream: Some(targets),
        }
    }

    /// Service name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to this service's chaos configuration
    #[must_use]
    pub fn chaos(&self) -> &ChaosCell {
        &self.chaos
    }

    /// Liveness payload
    #[must_use]
    pub fn health(&self) -> Value {
        json!({
            "status": "ok",
            "service": self.name,
            "time": Utc::now().to_rfc3339(),
        })
    }

    /// Handle one `/work` request.
    ///
    /// Chaos is applied first: simulated latency is slept, a timeout
    /// outcome stalls past the caller's patience window, and a failure
    /// outcome returns immediately with no downstream calls.
    pub async fn handle_work(
        &self,
        request: &TransportRequest,
        mesh: &ServiceMesh,
    ) -> Result<TransportReply, TransportError> {
        let payload = WorkPayload::parse(request.body.as_ref());
        let timeout_ms = payload.timeout_ms();

        let config = self.chaos.get().await;
        let outcome = {
            let mut rng = self.rng.lock().unwrap();
            evaluate_chaos(&config, timeout_ms, &mut *rng)
        };

        if outcome.simulated_latency_ms > 0 {
            pause(outcome.simulated_latency_ms, &request.cancel).await?;
        }

        if outcome.should_timeout {
            debug!(service = %self.name, timeout_ms, "stalling past caller budget");
            pause(timeout_ms + STALL_EXTRA_MS, &request.cancel).await?;
        }

        if outcome.should_fail {
            let status = outcome.status_code.unwrap_or(500);
            let error = outcome
                .error_message
                .unwrap_or_else(|| "forced failure".to_string());
            return Ok(TransportReply::with_status(
                status,
                json!({"ok": false, "service": self.name, "error": error}),
            ));
        }

        let downstream = match &self.downstream {
            Some(targets) => {
                let workflow = payload.workflow.unwrap_or(WorkflowKind::Chain);
                let hop_timeout_ms = downstream_timeout_ms(timeout_ms, workflow);
                let client = CorrelatedClient::new(Arc::new(mesh.clone()));
                Some(
                    run_workflow(
                        &client,
                        workflow,
                        targets,
                        &payload,
                        request.correlation,
                        hop_timeout_ms,
                        &self.rng,
                    )
                    .await,
                )
            }
            None => None,
        };

        let echo = self.echo_value(&payload);
        let reply = WorkReply {
            ok: true,
            service: self.name.clone(),
            echo,
            duration_simulated_ms: outcome.simulated_latency_ms,
            downstream,
        };
        let body = serde_json::to_value(&reply)
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(TransportReply::ok(body))
    }

    /// Leaves echo the synthetic payload when one is requested; the
    /// entry service echoes the caller's data untouched.
    fn echo_value(&self, payload: &WorkPayload) -> Value {
        if self.downstream.is_none() {
            if let Some(size) = payload.payload_size {
                if size > 0 {
                    let len = (size as usize).min(crate::payload::MAX_ECHO_BYTES);
                    return Value::String("x".repeat(len));
                }
            }
        }
        payload.data.clone().unwrap_or(Value::Null)
    }
}

async fn pause(ms: u64, cancel: &CancellationToken) -> Result<(), TransportError> {
    tokio::select! {
        () = cancel.cancelled() => Err(TransportError::Aborted),
        () = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
    }
}
