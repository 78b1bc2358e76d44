//! In-process service mesh.
//!
//! A registry of simulated services that implements the client's
//! transport seam: the destination is resolved by name and the request
//! dispatched to the service handler. Downstream hops issued by the
//! entry service travel through the same mesh, so every hop shares one
//! transport and one cancellation discipline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use faultline_chaos::HarnessSeed;
use faultline_client::{ServiceTransport, TransportError, TransportReply, TransportRequest};
use serde_json::json;

use crate::service::SimulatedService;
use crate::workflow::DownstreamTargets;

/// Name of the entry service in the standard topology
pub const ENTRY_SERVICE: &str = "alpha";
/// First leaf of the standard topology
pub const LEAF_FIRST: &str = "beta";
/// Second leaf of the standard topology
pub const LEAF_SECOND: &str = "gamma";

struct MeshInner {
    services: HashMap<String, Arc<SimulatedService>>,
    order: Vec<String>,
}

/// Shared handle to the simulated service registry
#[derive(Clone)]
pub struct ServiceMesh {
    inner: Arc<MeshInner>,
}

impl ServiceMesh {
    /// Create a mesh from a list of services
    #[must_use]
    pub fn new(services: Vec<SimulatedService>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for service in services {
            order.push(service.name().to_string());
            map.insert(service.name().to_string(), Arc::new(service));
        }
        Self {
            inner: Arc::new(MeshInner {
                services: map,
                order,
            }),
        }
    }

    /// The standard three-service topology: `alpha` fanning out to
    /// `beta` and `gamma`
    #[must_use]
    pub fn standard(seed: &HarnessSeed) -> Self {
        Self::new(vec![
            SimulatedService::entry(
                ENTRY_SERVICE,
                seed,
                DownstreamTargets::new(LEAF_FIRST, LEAF_SECOND),
            ),
            SimulatedService::leaf(LEAF_FIRST, seed),
            SimulatedService::leaf(LEAF_SECOND, seed),
        ])
    }

    /// Look up a service by name
    #[must_use]
    pub fn service(&self, name: &str) -> Option<Arc<SimulatedService>> {
        self.inner.services.get(name).cloned()
    }

    /// All services in registration order
    #[must_use]
    pub fn services(&self) -> Vec<Arc<SimulatedService>> {
        self.inner
            .order
            .iter()
            .filter_map(|name| self.inner.services.get(name).cloned())
            .collect()
    }

    /// Registered service names
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.inner.order.clone()
    }
}

#[async_trait]
impl ServiceTransport for ServiceMesh {
    async fn send(&self, request: TransportRequest) -> Result<TransportReply, TransportError> {
        let service = self
            .service(&request.target)
            .ok_or_else(|| TransportError::UnknownService(request.target.clone()))?;

        match request.route.as_str() {
            "/work" => service.handle_work(&request, self).await,
            "/health" => Ok(TransportReply::ok(service.health())),
            other => Ok(TransportReply::with_status(
                404,
                json!({"ok": false, "error": format!("no route {}", other)}),
            )),
        }
    }
}
