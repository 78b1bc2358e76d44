//! Per-service chaos configuration cell.
//!
//! One explicitly owned, single-writer value per service. Updates replace
//! the snapshot wholesale; in-flight evaluations may observe either the
//! old or the new snapshot, which is acceptable by design.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{ChaosConfig, ChaosUpdate};

/// Handle to the chaos configuration of one simulated service
#[derive(Debug, Clone)]
pub struct ChaosCell {
    service_name: String,
    config: Arc<RwLock<ChaosConfig>>,
}

impl ChaosCell {
    /// Create a cell with `normal` defaults for the service
    #[must_use]
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            config: Arc::new(RwLock::new(ChaosConfig::normal(service_name))),
        }
    }

    /// Name of the owning service
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Current configuration snapshot
    pub async fn get(&self) -> ChaosConfig {
        self.config.read().await.clone()
    }

    /// Merge a validated partial update and return the new snapshot
    pub async fn update(&self, update: &ChaosUpdate) -> ChaosConfig {
        let mut config = self.config.write().await;
        *config = update.apply(&config);
        config.clone()
    }

    /// Restore `normal` defaults and return the new snapshot
    pub async fn reset(&self) -> ChaosConfig {
        let mut config = self.config.write().await;
        *config = ChaosConfig::normal(&self.service_name);
        config.clone()
    }
}
