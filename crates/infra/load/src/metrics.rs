//! Prometheus metrics for the load engine.

use metrics::{Counter, Gauge, Histogram, counter, describe_counter};
use metrics_derive::Metrics;

use crate::{BatchResult, FailureReason, GasState};

/// Round, transfer and gas metrics, scoped `block_filler`.
#[derive(Metrics, Clone)]
#[metrics(scope = "block_filler")]
pub struct LoadMetrics {
    /// Rounds that submitted a batch.
    #[metric(describe = "Count of completed rounds")]
    pub rounds: Counter,

    /// Rounds skipped for lack of a base price.
    #[metric(describe = "Count of rounds skipped because no base gas price was known")]
    pub rounds_skipped: Counter,

    /// Transfer intents built.
    #[metric(describe = "Count of transfer intents attempted")]
    pub transfers_attempted: Counter,

    /// Transfers the node accepted.
    #[metric(describe = "Count of transfers accepted by the node")]
    pub transfers_sent: Counter,

    /// Wallets whose pending nonce fell behind the cached one.
    #[metric(describe = "Count of wallets whose pending nonce drifted from the expected value")]
    pub nonce_drift: Counter,

    /// Gas price multiplier, in percent.
    #[metric(describe = "Current gas price multiplier in percent")]
    pub gas_multiplier: Gauge,

    /// Latest bid.
    #[metric(describe = "Gas price bid in the latest round, in wei")]
    pub gas_price: Gauge,

    /// Wallets still taking part.
    #[metric(describe = "Number of wallets taking part in rounds")]
    pub active_wallets: Gauge,

    /// Per-round success rate in `[0, 1]`.
    #[metric(describe = "Success rate of each round")]
    pub round_success_rate: Histogram,

    /// Per-round wall time.
    #[metric(describe = "Time taken by each round in seconds")]
    pub round_duration: Histogram,
}

impl LoadMetrics {
    /// Counter of failed transfers, labelled by [`Self::REASON_LABEL`].
    pub const TRANSFERS_FAILED: &str = "block_filler_transfers_failed";
    /// Label carrying [`FailureReason::as_str`].
    pub const REASON_LABEL: &str = "reason";

    /// Describes the derived metrics and the per-reason failure counter.
    pub fn describe_all() {
        Self::describe();
        describe_counter!(Self::TRANSFERS_FAILED, "Count of failed transfers by reason");
    }

    /// Records one round.
    pub fn record_batch(&self, batch: &BatchResult, gas_price: u128, duration_secs: f64) {
        self.rounds.increment(1);
        self.transfers_attempted.increment(batch.total());
        self.transfers_sent.increment(batch.successful());
        self.gas_price.set(gas_price as f64);
        self.round_duration.record(duration_secs);
        if batch.total() > 0 {
            self.round_success_rate.record(batch.successful() as f64 / batch.total() as f64);
        }

        for reason in FailureReason::ALL {
            let n = batch.failures(reason);
            if n > 0 {
                counter!(Self::TRANSFERS_FAILED, Self::REASON_LABEL => reason.as_str())
                    .increment(n);
            }
        }
    }

    /// Publishes the controller state.
    pub fn record_gas_state(&self, state: GasState) {
        self.gas_multiplier.set(state.multiplier as f64);
    }
}
