//! FAULTLINE Correlated Call Client
//!
//! Performs one network call per invocation with correlation
//! propagation, soft+hard timeout racing, error classification, and a
//! retry/backoff wrapper. The network itself sits behind the
//! [`ServiceTransport`] trait so the same client drives real and
//! simulated services alike.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call;
pub mod outcome;
pub mod transport;

// Re-exports
pub use call::{CallSpec, CorrelatedClient, HARD_TIMEOUT_MARGIN_MS};
pub use outcome::CallOutcome;
pub use transport::{ServiceTransport, TransportError, TransportReply, TransportRequest};
