//! Chaos configuration for a simulated service.

use chrono::{DateTime, Utc};
use faultline_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Fault-injection behavior currently configured for a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChaosMode {
    /// No injected faults
    #[serde(rename = "normal")]
    Normal,
    /// Every call fails with the configured status
    #[serde(rename = "forceStatus")]
    ForceStatus,
    /// Calls fail with the configured probability
    #[serde(rename = "probabilisticError")]
    ProbabilisticError,
    /// Calls succeed after the configured latency
    #[serde(rename = "latency")]
    Latency,
    /// Calls stall past the caller's timeout
    #[serde(rename = "timeout")]
    Timeout,
}

/// Configuration snapshot for one simulated service
///
/// A process-wide single value per service, replaced wholesale on update.
/// No history is retained; only the current snapshot matters to the
/// evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosConfig {
    /// Owning service name
    pub service_name: String,
    /// Active chaos mode
    pub mode: ChaosMode,
    /// Status code used by `forceStatus`
    #[serde(default)]
    pub force_status_code: Option<u16>,
    /// Failure probability used by `probabilisticError` (0-1)
    #[serde(default)]
    pub error_probability: Option<f64>,
    /// Fixed simulated latency in milliseconds
    #[serde(default)]
    pub fixed_latency_ms: Option<u64>,
    /// Random latency range lower bound
    #[serde(default)]
    pub random_latency_min_ms: Option<u64>,
    /// Random latency range upper bound
    #[serde(default)]
    pub random_latency_max_ms: Option<u64>,
    /// Stall probability used by `timeout` mode (0-1)
    #[serde(default)]
    pub timeout_probability: Option<f64>,
    /// Time of the last configuration write
    pub updated_at: DateTime<Utc>,
}

impl ChaosConfig {
    /// Defaults for a service: `normal` mode, no parameters
    #[must_use]
    pub fn normal(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            mode: ChaosMode::Normal,
            force_status_code: None,
            error_probability: None,
            fixed_latency_ms: None,
            random_latency_min_ms: None,
            random_latency_max_ms: None,
            timeout_probability: None,
            updated_at: Utc::now(),
        }
    }
}

/// Partial configuration update; unset fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosUpdate {
    /// New chaos mode
    pub mode: Option<ChaosMode>,
    /// New forced status code (400-599)
    pub force_status_code: Option<u16>,
    /// New failure probability (0-1)
    pub error_probability: Option<f64>,
    /// New fixed latency
    pub fixed_latency_ms: Option<u64>,
    /// New random latency lower bound
    pub random_latency_min_ms: Option<u64>,
    /// New random latency upper bound
    pub random_latency_max_ms: Option<u64>,
    /// New stall probability (0-1)
    pub timeout_probability: Option<f64>,
}

impl ChaosUpdate {
    /// Validate field ranges
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error naming the offending field
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(code) = self.force_status_code {
            if !(400..=599).contains(&code) {
                return Err(CoreError::Validation {
                    field: "forceStatusCode".to_string(),
                    reason: "must be between 400 and 599".to_string(),
                });
            }
        }
        if let Some(p) = self.error_probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(CoreError::Validation {
                    field: "errorProbability".to_string(),
                    reason: "must be between 0 and 1".to_string(),
                });
            }
        }
        if let Some(p) = self.timeout_probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(CoreError::Validation {
                    field: "timeoutProbability".to_string(),
                    reason: "must be between 0 and 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Merge this update into a snapshot, stamping the write time
    #[must_use]
    pub fn apply(&self, current: &ChaosConfig) -> ChaosConfig {
        ChaosConfig {
            service_name: current.service_name.clone(),
            mode: self.mode.unwrap_or(current.mode),
            force_status_code: self.force_status_code.or(current.force_status_code),
            error_probability: self.error_probability.or(current.error_probability),
            fixed_latency_ms: self.fixed_latency_ms.or(current.fixed_latency_ms),
            random_latency_min_ms: self.random_latency_min_ms.or(current.random_latency_min_ms),
            random_latency_max_ms: self.random_latency_max_ms.or(current.random_latency_max_ms),
            timeout_probability: self.timeout_probability.or(current.timeout_probability),
            updated_at: Utc::now(),
        }
    }
}
