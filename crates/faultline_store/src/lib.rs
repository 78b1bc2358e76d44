//! FAULTLINE Persistence Seam
//!
//! The engine consumes persistence through [`HarnessStore`]; the
//! in-memory implementation here is the default backend.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod store;

// Re-exports
pub use memory::MemoryStore;
pub use store::{ClearedCounts, HarnessStore, RunPage};
