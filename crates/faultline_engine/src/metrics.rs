//! Latency and outcome aggregation.

use faultline_client::CallOutcome;
use faultline_core::{CallRecord, ErrorType, RunStats};

/// Nearest-rank percentile over a set of values.
///
/// Sorts ascending and picks index `ceil(p/100 * n) - 1`, clamped to
/// zero. An empty input yields 0.
#[must_use]
pub fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as i64 - 1;
    let idx = rank.max(0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Running totals for one run, shared by all workers.
///
/// Success for a root outcome means the client reported `ok`; success
/// for a downstream record means a status in [200, 400). A `timeout`
/// error kind additionally bumps the timeout counter, so
/// `timeout_calls <= error_calls` holds by construction.
#[derive(Debug, Default)]
pub struct RunTotals {
    stats: RunStats,
    durations: Vec<u64>,
}

impl RunTotals {
    /// Empty totals
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in the root outcome of one iteration
    pub fn record_root(&mut self, outcome: &CallOutcome) {
        self.stats.total_calls += 1;
        self.durations.push(outcome.duration_ms);
        if outcome.ok {
            self.stats.success_calls += 1;
        } else {
            self.stats.error_calls += 1;
            if outcome.error_type == Some(ErrorType::Timeout) {
                self.stats.timeout_calls += 1;
            }
        }
    }

    /// Fold in one downstream call record
    pub fn record_downstream(&mut self, call: &CallRecord) {
        self.stats.total_calls += 1;
        self.durations.push(call.duration_ms);
        let success = call
            .status_code
            .is_some_and(|code| (200..400).contains(&code));
        if success {
            self.stats.success_calls += 1;
        } else {
            self.stats.error_calls += 1;
            if call.error_type == Some(ErrorType::Timeout) {
                self.stats.timeout_calls += 1;
            }
        }
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// p50 and p95 over all recorded durations
    #[must_use]
    pub fn percentiles(&self) -> (u64, u64) {
        (percentile(&self.durations, 50.0), percentile(&self.durations, 95.0))
    }

    /// Number of recorded durations
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.durations.len()
    }
}
