//! FAULTLINE Server
//!
//! HTTP API for run submission, progress event streams, and per-service
//! chaos control.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod error;

pub use api::{router, AppState};
pub use error::ApiError;
