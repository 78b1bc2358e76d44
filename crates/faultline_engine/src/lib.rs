//! FAULTLINE Run Execution Engine
//!
//! The concurrency-bounded coordinator that fans out workflow
//! iterations, the metrics aggregator, the call graph builder, and the
//! progress event hub.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod events;
pub mod graph;
pub mod metrics;

// Re-exports
pub use coordinator::{CoordinatorConfig, RunCoordinator, RunDetail};
pub use events::{RunEvent, StreamHub, DEFAULT_STREAM_CAPACITY};
pub use graph::{build_call_graph, node_count, CallNode};
pub use metrics::{percentile, RunTotals};
