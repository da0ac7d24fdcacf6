//! Run-wide counters and the end-of-run summary.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{BatchResult, FailureReason};

/// Thread-safe counters accumulated across rounds.
#[derive(Debug, Default)]
pub struct Stats {
    rounds: AtomicU64,
    skipped_rounds: AtomicU64,
    attempted: AtomicU64,
    sent: AtomicU64,
    failed: [AtomicU64; FailureReason::ALL.len()],
    nonce_drift: AtomicU64,
}

impl Stats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one round's outcomes in.
    pub fn record_batch(&self, batch: &BatchResult) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
        self.attempted.fetch_add(batch.total(), Ordering::Relaxed);
        self.sent.fetch_add(batch.successful(), Ordering::Relaxed);
        for reason in FailureReason::ALL {
            let n = batch.failures(reason);
            if n > 0 {
                self.failed[reason_index(reason)].fetch_add(n, Ordering::Relaxed);
            }
        }
    }

    /// Records a round skipped before any send.
    pub fn record_skipped_round(&self) {
        self.skipped_rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a wallet whose on-chain nonce disagreed with the expected one.
    pub fn record_nonce_drift(&self) {
        self.nonce_drift.fetch_add(1, Ordering::Relaxed);
    }

    /// Completed rounds.
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    /// Rounds skipped before sending.
    pub fn skipped_rounds(&self) -> u64 {
        self.skipped_rounds.load(Ordering::Relaxed)
    }

    /// Intents attempted.
    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    /// Sends that counted as successes.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Failures with the given reason.
    pub fn failed(&self, reason: FailureReason) -> u64 {
        self.failed[reason_index(reason)].load(Ordering::Relaxed)
    }

    /// Failures of any reason.
    pub fn failed_total(&self) -> u64 {
        FailureReason::ALL.iter().map(|r| self.failed(*r)).sum()
    }

    /// Nonce drift observations.
    pub fn nonce_drift(&self) -> u64 {
        self.nonce_drift.load(Ordering::Relaxed)
    }

    /// Success rate between 0.0 and 1.0.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            return 0.0;
        }
        self.sent() as f64 / attempted as f64
    }

    /// Snapshot for reporting.
    pub fn summary(&self, final_multiplier: u64, elapsed: Duration) -> RunSummary {
        RunSummary {
            rounds: self.rounds(),
            skipped_rounds: self.skipped_rounds(),
            attempted: self.attempted(),
            sent: self.sent(),
            failures: FailureCounts {
                insufficient_funds: self.failed(FailureReason::InsufficientFunds),
                gas_exceeds_allowance: self.failed(FailureReason::GasExceedsAllowance),
                underpriced: self.failed(FailureReason::Underpriced),
                reverted: self.failed(FailureReason::Reverted),
                unknown: self.failed(FailureReason::Unknown),
            },
            nonce_drift: self.nonce_drift(),
            success_rate: self.success_rate(),
            final_multiplier,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

const fn reason_index(reason: FailureReason) -> usize {
    match reason {
        FailureReason::InsufficientFunds => 0,
        FailureReason::GasExceedsAllowance => 1,
        FailureReason::Underpriced => 2,
        FailureReason::Reverted => 3,
        FailureReason::Unknown => 4,
    }
}

/// Failure counts by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    /// Sender could not pay.
    pub insufficient_funds: u64,
    /// Gas needed exceeded the allowance.
    pub gas_exceeds_allowance: u64,
    /// Bid too low.
    pub underpriced: u64,
    /// Mined with failed status.
    pub reverted: u64,
    /// Anything else.
    pub unknown: u64,
}

/// End-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Completed rounds.
    pub rounds: u64,
    /// Rounds skipped because no base price was known.
    pub skipped_rounds: u64,
    /// Intents attempted.
    pub attempted: u64,
    /// Sends that counted as successes.
    pub sent: u64,
    /// Failures by reason.
    pub failures: FailureCounts,
    /// Nonce drift observations.
    pub nonce_drift: u64,
    /// `sent / attempted`.
    pub success_rate: f64,
    /// Gas multiplier at the end of the run, in percent.
    pub final_multiplier: u64,
    /// Wall-clock run time.
    pub elapsed_secs: f64,
}
