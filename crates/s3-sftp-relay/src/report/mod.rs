//! Per-item outcomes and the final run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::Result;

/// Final status of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Result of attempting one candidate. Immutable once recorded.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub key: String,
    pub status: TransferStatus,
    /// Failure or skip reason, for the report.
    pub reason: Option<String>,
    /// Attempts made, including the successful or final failed one.
    pub attempts: u32,
    /// Bytes written to the remote endpoint.
    pub bytes: u64,
}

impl TransferOutcome {
    pub fn succeeded(key: impl Into<String>, attempts: u32, bytes: u64) -> Self {
        Self {
            key: key.into(),
            status: TransferStatus::Succeeded,
            reason: None,
            attempts,
            bytes,
        }
    }

    pub fn failed(key: impl Into<String>, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            key: key.into(),
            status: TransferStatus::Failed,
            reason: Some(reason.into()),
            attempts,
            bytes: 0,
        }
    }

    pub fn skipped(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: TransferStatus::Skipped,
            reason: Some(reason.into()),
            attempts: 0,
            bytes: 0,
        }
    }
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithFailures,
    Cancelled,
}

/// One failed candidate in the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedTransfer {
    pub key: String,
    pub reason: String,
    pub attempts: u32,
}

/// Result of a relay run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Candidates transferred successfully.
    pub succeeded: usize,

    /// Candidates skipped (ledger hits and directory markers).
    pub skipped: usize,

    /// Failed candidates with reasons, in outcome arrival order.
    pub failed: Vec<FailedTransfer>,

    /// Total bytes written to the remote endpoint.
    pub bytes_transferred: u64,

    /// Whether the run was cut short by a cancellation signal.
    pub cancelled: bool,
}

impl RunReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Default)]
struct Tally {
    succeeded: usize,
    skipped: usize,
    failed: Vec<FailedTransfer>,
    bytes: u64,
    outcomes: usize,
}

/// Collects outcomes arriving concurrently from the workers.
///
/// Failure ordering follows outcome arrival, not candidate order; with
/// concurrent workers that is the only order there is.
#[derive(Default)]
pub struct ResultAggregator {
    tally: Mutex<Tally>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome.
    pub fn record(&self, outcome: TransferOutcome) {
        let mut tally = self.tally.lock().unwrap();
        tally.outcomes += 1;
        match outcome.status {
            TransferStatus::Succeeded => {
                tally.succeeded += 1;
                tally.bytes += outcome.bytes;
            }
            TransferStatus::Skipped => tally.skipped += 1,
            TransferStatus::Failed => tally.failed.push(FailedTransfer {
                key: outcome.key,
                reason: outcome.reason.unwrap_or_else(|| "unknown".into()),
                attempts: outcome.attempts,
            }),
        }
    }

    /// Number of outcomes recorded so far.
    pub fn outcome_count(&self) -> usize {
        self.tally.lock().unwrap().outcomes
    }

    /// Build the final report once all candidates are drained.
    pub fn finalize(
        &self,
        run_id: String,
        started_at: DateTime<Utc>,
        cancelled: bool,
    ) -> RunReport {
        let tally = std::mem::take(&mut *self.tally.lock().unwrap());
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let status = if cancelled {
            RunStatus::Cancelled
        } else if tally.failed.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithFailures
        };

        RunReport {
            run_id,
            status,
            started_at,
            completed_at,
            duration_seconds,
            succeeded: tally.succeeded,
            skipped: tally.skipped,
            failed: tally.failed,
            bytes_transferred: tally.bytes,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregator_counts() {
        let agg = ResultAggregator::new();
        agg.record(TransferOutcome::succeeded("a.txt", 1, 100));
        agg.record(TransferOutcome::skipped("dir/", "directory marker"));
        agg.record(TransferOutcome::failed("c.txt", "timeout", 3));
        assert_eq!(agg.outcome_count(), 3);

        let report = agg.finalize("run-1".into(), Utc::now(), false);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, "c.txt");
        assert_eq!(report.failed[0].attempts, 3);
        assert_eq!(report.bytes_transferred, 100);
        assert_eq!(report.status, RunStatus::CompletedWithFailures);
    }

    #[test]
    fn test_clean_run_status() {
        let agg = ResultAggregator::new();
        agg.record(TransferOutcome::succeeded("a.txt", 1, 10));
        let report = agg.finalize("run-2".into(), Utc::now(), false);
        assert_eq!(report.status, RunStatus::Completed);
    }

    #[test]
    fn test_cancelled_status_wins() {
        let agg = ResultAggregator::new();
        agg.record(TransferOutcome::succeeded("a.txt", 1, 10));
        let report = agg.finalize("run-3".into(), Utc::now(), true);
        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(report.cancelled);
    }

    #[test]
    fn test_report_serializes() {
        let agg = ResultAggregator::new();
        let report = agg.finalize("run-4".into(), Utc::now(), false);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"run_id\""));
        assert!(json.contains("\"completed\""));
    }
}
