//! The round loop.
//!
//! Each iteration reads the base gas price, snapshots the controller's bid, runs one
//! barrier-synchronised round and feeds the outcome back into the controller before
//! sleeping. Rounds never overlap. Cancellation is checked between rounds and during the
//! delay; a round already in flight always drains.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    BatchSubmitter, ChainClient, GasAdjustment, GasController, LoadConfig, LoadError,
    LoadMetrics, MIN_WALLETS, PoolError, RunSummary, Stats, WalletPool,
};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired.
    Cancelled,
    /// The configured round limit was reached.
    MaxRounds,
}

/// Loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Rounds are being issued.
    Running,
    /// No further rounds will run.
    Stopped(StopReason),
}

/// What a single iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A round ran and was recorded.
    Completed {
        /// Sends that counted as successes.
        successful: u64,
        /// Intents attempted.
        total: u64,
        /// Price every intent bid.
        gas_price: u128,
        /// Controller step taken afterwards.
        adjustment: GasAdjustment,
    },
    /// No base price was available, nothing was sent.
    Skipped,
}

/// Drives rounds until cancelled or bounded out.
#[derive(Debug)]
pub struct RoundLoop<C> {
    client: Arc<C>,
    pool: WalletPool<C>,
    submitter: BatchSubmitter<C>,
    gas: GasController,
    config: LoadConfig,
    stats: Stats,
    metrics: LoadMetrics,
    cancel: CancellationToken,
    state: LoopState,
    last_base_price: Option<u128>,
    rounds_run: u64,
}

impl<C: ChainClient> RoundLoop<C> {
    /// Creates a loop over a funded pool.
    pub fn new(
        client: Arc<C>,
        pool: WalletPool<C>,
        config: LoadConfig,
        cancel: CancellationToken,
    ) -> Self {
        let submitter = BatchSubmitter::new(Arc::clone(&client), &config);
        Self {
            client,
            pool,
            submitter,
            gas: GasController::new(),
            config,
            stats: Stats::new(),
            metrics: LoadMetrics::default(),
            cancel,
            state: LoopState::Running,
            last_base_price: None,
            rounds_run: 0,
        }
    }

    /// Replaces the controller, e.g. to start from a different multiplier.
    pub fn with_gas_controller(mut self, gas: GasController) -> Self {
        self.gas = gas;
        self
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// The gas controller.
    pub const fn gas(&self) -> &GasController {
        &self.gas
    }

    /// Run-wide counters.
    pub const fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Runs rounds until cancelled or `max_rounds` is reached.
    pub async fn run(&mut self) -> Result<RunSummary, LoadError> {
        let active = self.pool.active_count();
        if active < MIN_WALLETS {
            return Err(
                PoolError::TooFewWallets { available: active, required: MIN_WALLETS }.into()
            );
        }

        let started = Instant::now();
        self.metrics.active_wallets.set(active as f64);
        self.metrics.record_gas_state(self.gas.state());
        info!(
            target: "round",
            wallets = active,
            burst_size = self.config.burst_size,
            max_rounds = ?self.config.max_rounds,
            "Starting round loop"
        );

        while self.state == LoopState::Running {
            if self.cancel.is_cancelled() {
                self.stop(StopReason::Cancelled);
                break;
            }
            if self.config.max_rounds.is_some_and(|max| self.rounds_run >= max) {
                self.stop(StopReason::MaxRounds);
                break;
            }

            self.run_round().await;

            if self.config.max_rounds.is_some_and(|max| self.rounds_run >= max) {
                self.stop(StopReason::MaxRounds);
                break;
            }

            let cancelled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => true,
                _ = tokio::time::sleep(self.config.round_delay) => false,
            };
            if cancelled {
                self.stop(StopReason::Cancelled);
            }
        }

        let summary = self.stats.summary(self.gas.multiplier(), started.elapsed());
        info!(
            target: "round",
            rounds = summary.rounds,
            skipped = summary.skipped_rounds,
            attempted = summary.attempted,
            sent = summary.sent,
            success_rate = summary.success_rate,
            multiplier = summary.final_multiplier,
            "Round loop stopped"
        );
        Ok(summary)
    }

    /// Runs a single round and records it.
    pub async fn run_round(&mut self) -> RoundOutcome {
        self.rounds_run += 1;
        let round = self.rounds_run;

        let Some(base_price) = self.base_gas_price().await else {
            warn!(target: "round", round, "No base gas price known, skipping round");
            self.stats.record_skipped_round();
            self.metrics.rounds_skipped.increment(1);
            return RoundOutcome::Skipped;
        };

        let gas_price = self.gas.current_gas_price(base_price);
        let wallets = self.pool.active_wallets();
        let started = Instant::now();

        let batch = self.submitter.submit_round(&wallets, gas_price).await;

        for drift in self.pool.reconcile_nonces(&wallets, &batch) {
            debug!(target: "round", round, wallet = %drift.address, "Adopting network nonce");
            self.stats.record_nonce_drift();
            self.metrics.nonce_drift.increment(1);
        }

        let successful = batch.successful();
        let total = batch.total();
        let adjustment = self.gas.record_batch(successful, total);

        self.stats.record_batch(&batch);
        self.metrics.record_batch(&batch, gas_price, started.elapsed().as_secs_f64());
        self.metrics.record_gas_state(self.gas.state());

        info!(
            target: "round",
            round,
            successful,
            total,
            gas_price,
            multiplier = self.gas.multiplier(),
            "Round complete"
        );

        RoundOutcome::Completed { successful, total, gas_price, adjustment }
    }

    async fn base_gas_price(&mut self) -> Option<u128> {
        match self.client.gas_price().await {
            Ok(price) => {
                self.last_base_price = Some(price);
                Some(price)
            }
            Err(err) => {
                warn!(
                    target: "round",
                    error = %err,
                    fallback = ?self.last_base_price,
                    "Failed to fetch base gas price"
                );
                self.last_base_price
            }
        }
    }

    fn stop(&mut self, reason: StopReason) {
        debug!(target: "round", ?reason, "Stopping");
        self.state = LoopState::Stopped(reason);
    }
}
