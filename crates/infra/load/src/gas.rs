//! Adaptive gas price controller.
//!
//! The controller bids a percentage of the node's base gas price. After every round it
//! looks at that round's success rate: below 70% the multiplier grows by 10%, above
//! 90% it shrinks by 5%, and in between it holds. The multiplier is clamped to
//! `[80, 200]` percent. All arithmetic is integer so long runs do not drift.

use tracing::{debug, info};

/// Multiplier the controller starts from, in percent.
pub const INITIAL_MULTIPLIER: u64 = 100;
/// Lowest allowed multiplier, in percent.
pub const MIN_MULTIPLIER: u64 = 80;
/// Highest allowed multiplier, in percent.
pub const MAX_MULTIPLIER: u64 = 200;
/// Step applied when the success rate is too low, in percent.
pub const INCREASE_FACTOR: u64 = 110;
/// Step applied when the success rate is comfortably high, in percent.
pub const DECREASE_FACTOR: u64 = 95;
/// Success rate under which the price goes up, in percent.
pub const MIN_SUCCESS_RATE_PCT: u64 = 70;
/// Success rate over which the price goes down, in percent.
pub const MAX_SUCCESS_RATE_PCT: u64 = 90;
/// Batches after which the rolling counters are cleared.
pub const STATS_WINDOW: u64 = 5;

const SCALE: u64 = 100;

/// Snapshot of the controller's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasState {
    /// Percentage of the base gas price to bid.
    pub multiplier: u64,
    /// Successful sends since the last reset.
    pub success_count: u64,
    /// Attempted sends since the last reset.
    pub total_count: u64,
    /// Batches since the last reset.
    pub batch_count: u64,
}

impl Default for GasState {
    fn default() -> Self {
        Self { multiplier: INITIAL_MULTIPLIER, success_count: 0, total_count: 0, batch_count: 0 }
    }
}

/// Direction the multiplier moved after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasAdjustment {
    /// Success rate below the band; multiplier raised (possibly already at the cap).
    Increased {
        /// Multiplier before the step.
        from: u64,
        /// Multiplier after the step.
        to: u64,
    },
    /// Success rate above the band; multiplier lowered (possibly already at the floor).
    Decreased {
        /// Multiplier before the step.
        from: u64,
        /// Multiplier after the step.
        to: u64,
    },
    /// Success rate inside the dead band.
    Unchanged,
}

/// Tunes the bid multiplier from round outcomes.
///
/// Owned by the round loop and mutated only between rounds.
#[derive(Debug, Clone, Default)]
pub struct GasController {
    state: GasState,
}

impl GasController {
    /// A controller at the initial multiplier.
    pub fn new() -> Self {
        Self::default()
    }

    /// A controller starting from `multiplier`, clamped to the allowed range.
    pub fn with_multiplier(multiplier: u64) -> Self {
        Self {
            state: GasState {
                multiplier: multiplier.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER),
                ..GasState::default()
            },
        }
    }

    /// Current state.
    pub const fn state(&self) -> GasState {
        self.state
    }

    /// Current multiplier in percent.
    pub const fn multiplier(&self) -> u64 {
        self.state.multiplier
    }

    /// The price to bid for a given base price: `base * multiplier / 100`.
    pub const fn current_gas_price(&self, base_gas_price: u128) -> u128 {
        base_gas_price.saturating_mul(self.state.multiplier as u128) / SCALE as u128
    }

    /// Feeds one batch outcome into the controller.
    ///
    /// Only this batch's rate drives the step. A batch with `total == 0` carries no
    /// signal and is ignored.
    pub fn record_batch(&mut self, successful: u64, total: u64) -> GasAdjustment {
        if total == 0 {
            debug!(target: "gas", "Ignoring empty batch");
            return GasAdjustment::Unchanged;
        }
        let successful = successful.min(total);

        self.state.success_count += successful;
        self.state.total_count += total;
        self.state.batch_count += 1;

        // successful / total < 0.70  <=>  successful * 100 < 70 * total
        let scaled = successful * SCALE;
        let from = self.state.multiplier;
        let adjustment = if scaled < MIN_SUCCESS_RATE_PCT * total {
            self.state.multiplier = (from * INCREASE_FACTOR / SCALE).min(MAX_MULTIPLIER);
            GasAdjustment::Increased { from, to: self.state.multiplier }
        } else if scaled > MAX_SUCCESS_RATE_PCT * total {
            self.state.multiplier = (from * DECREASE_FACTOR / SCALE).max(MIN_MULTIPLIER);
            GasAdjustment::Decreased { from, to: self.state.multiplier }
        } else {
            GasAdjustment::Unchanged
        };

        info!(
            target: "gas",
            success_rate_pct = scaled / total,
            multiplier = self.state.multiplier,
            ?adjustment,
            "Recorded batch"
        );

        if self.state.batch_count >= STATS_WINDOW {
            debug!(
                target: "gas",
                success_count = self.state.success_count,
                total_count = self.state.total_count,
                "Resetting rolling gas stats"
            );
            self.state.success_count = 0;
            self.state.total_count = 0;
            self.state.batch_count = 0;
        }

        adjustment
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    use super::*;

    #[test]
    fn price_scales_with_multiplier() {
        let controller = GasController::new();
        assert_eq!(controller.current_gas_price(1_000_000_000), 1_000_000_000);

        let controller = GasController::with_multiplier(150);
        assert_eq!(controller.current_gas_price(1_000_000_000), 1_500_000_000);
    }

    #[rstest]
    #[case(80)]
    #[case(104)]
    #[case(133)]
    #[case(200)]
    fn price_is_linear_in_base(#[case] multiplier: u64) {
        let controller = GasController::with_multiplier(multiplier);
        for base in [100u128, 7_000, 1_000_000_000, 123_456_789_000] {
            assert_eq!(
                controller.current_gas_price(2 * base),
                2 * controller.current_gas_price(base)
            );
        }
    }

    #[test]
    fn documented_scenario() {
        let mut controller = GasController::new();

        assert_eq!(controller.record_batch(6, 10), GasAdjustment::Increased { from: 100, to: 110 });
        assert_eq!(controller.record_batch(9, 10), GasAdjustment::Unchanged);
        assert_eq!(controller.multiplier(), 110);
        assert_eq!(
            controller.record_batch(10, 10),
            GasAdjustment::Decreased { from: 110, to: 104 }
        );
    }

    #[rstest]
    #[case::just_below_band(69, 100, true, false)]
    #[case::lower_edge(70, 100, false, false)]
    #[case::middle(80, 100, false, false)]
    #[case::upper_edge(90, 100, false, false)]
    #[case::just_above_band(91, 100, false, true)]
    #[case::all_failed(0, 20, true, false)]
    #[case::all_sent(20, 20, false, true)]
    fn dead_band_boundaries(
        #[case] successful: u64,
        #[case] total: u64,
        #[case] raises: bool,
        #[case] lowers: bool,
    ) {
        let mut controller = GasController::new();
        controller.record_batch(successful, total);
        let m = controller.multiplier();
        assert_eq!(m > INITIAL_MULTIPLIER, raises);
        assert_eq!(m < INITIAL_MULTIPLIER, lowers);
    }

    #[test]
    fn strictly_monotone_until_clamped() {
        let mut controller = GasController::new();
        let mut last = controller.multiplier();
        while last < MAX_MULTIPLIER {
            controller.record_batch(0, 10);
            assert!(controller.multiplier() > last);
            last = controller.multiplier();
        }
        controller.record_batch(0, 10);
        assert_eq!(controller.multiplier(), MAX_MULTIPLIER);

        while last > MIN_MULTIPLIER {
            controller.record_batch(10, 10);
            assert!(controller.multiplier() < last);
            last = controller.multiplier();
        }
        controller.record_batch(10, 10);
        assert_eq!(controller.multiplier(), MIN_MULTIPLIER);
    }

    #[test]
    fn multiplier_stays_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut controller = GasController::new();
        for _ in 0..10_000 {
            let total = rng.gen_range(1..=200);
            let successful = rng.gen_range(0..=total);
            controller.record_batch(successful, total);
            let m = controller.multiplier();
            assert!((MIN_MULTIPLIER..=MAX_MULTIPLIER).contains(&m), "multiplier {m} out of range");
        }
    }

    #[test]
    fn counters_reset_after_window() {
        let mut controller = GasController::new();
        for i in 1..STATS_WINDOW {
            controller.record_batch(3, 10);
            let state = controller.state();
            assert_eq!(state.batch_count, i);
            assert_eq!(state.success_count, 3 * i);
            assert_eq!(state.total_count, 10 * i);
        }

        controller.record_batch(10, 10);
        let state = controller.state();
        assert_eq!(state.batch_count, 0);
        assert_eq!(state.success_count, 0);
        assert_eq!(state.total_count, 0);
    }

    #[test]
    fn empty_batch_is_ignored() {
        let mut controller = GasController::new();
        assert_eq!(controller.record_batch(0, 0), GasAdjustment::Unchanged);
        assert_eq!(controller.state(), GasState::default());
    }

    #[test]
    fn starting_multiplier_is_clamped() {
        assert_eq!(GasController::with_multiplier(10).multiplier(), MIN_MULTIPLIER);
        assert_eq!(GasController::with_multiplier(1_000).multiplier(), MAX_MULTIPLIER);
    }
}
