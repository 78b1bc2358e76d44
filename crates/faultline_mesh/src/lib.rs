//! FAULTLINE Simulated Service Mesh
//!
//! Simulated downstream services with configurable fault injection, the
//! workflow executor that runs inside the entry service, and the
//! in-process transport that wires them together.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod mesh;
pub mod payload;
pub mod service;
pub mod workflow;

// Re-exports
pub use mesh::{ServiceMesh, ENTRY_SERVICE, LEAF_FIRST, LEAF_SECOND};
pub use payload::{DownstreamCall, WorkPayload, WorkReply, DEFAULT_WORK_TIMEOUT_MS};
pub use service::{SimulatedService, STALL_EXTRA_MS};
pub use workflow::{downstream_timeout_ms, DownstreamTargets, HOP_BUDGET_OVERHEAD_MS, MIN_HOP_TIMEOUT_MS};
