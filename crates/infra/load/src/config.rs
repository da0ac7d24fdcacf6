//! Engine configuration.

use std::time::Duration;

use alloy_primitives::U256;

/// One whole token or ether, in base units (18 decimals).
pub const ONE_TOKEN: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Configuration for the round loop and batch submitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadConfig {
    /// Transfers each wallet sends per round.
    pub burst_size: u64,
    /// Floor applied to every gas estimate.
    pub base_gas_limit: u64,
    /// Token amount moved by each transfer.
    pub amount: U256,
    /// Pause between rounds.
    pub round_delay: Duration,
    /// Stop after this many rounds; `None` runs until cancelled.
    pub max_rounds: Option<u64>,
    /// Count a send as successful only once its receipt reports success.
    pub await_receipts: bool,
    /// Poll interval used while waiting for receipts.
    pub receipt_poll_interval: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            burst_size: 10,
            base_gas_limit: 100_000,
            amount: ONE_TOKEN / U256::from(10),
            round_delay: Duration::from_secs(1),
            max_rounds: None,
            await_receipts: false,
            receipt_poll_interval: Duration::from_millis(500),
        }
    }
}

impl LoadConfig {
    /// Sets the burst size.
    pub const fn with_burst_size(mut self, burst_size: u64) -> Self {
        self.burst_size = burst_size;
        self
    }

    /// Sets the gas limit floor.
    pub const fn with_base_gas_limit(mut self, limit: u64) -> Self {
        self.base_gas_limit = limit;
        self
    }

    /// Sets the per-transfer amount.
    pub const fn with_amount(mut self, amount: U256) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the inter-round delay.
    pub const fn with_round_delay(mut self, delay: Duration) -> Self {
        self.round_delay = delay;
        self
    }

    /// Bounds the number of rounds.
    pub const fn with_max_rounds(mut self, rounds: Option<u64>) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Waits for receipts before counting a send as successful.
    pub const fn with_await_receipts(mut self, await_receipts: bool) -> Self {
        self.await_receipts = await_receipts;
        self
    }
}

/// Minimum balances a pool wallet must hold before it joins the rounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingPolicy {
    /// Minimum native balance.
    pub min_native: U256,
    /// Minimum token balance.
    pub min_token: U256,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self { min_native: ONE_TOKEN / U256::from(100), min_token: ONE_TOKEN * U256::from(2) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = LoadConfig::default();
        assert_eq!(config.burst_size, 10);
        assert_eq!(config.base_gas_limit, 100_000);
        assert_eq!(config.amount, U256::from(100_000_000_000_000_000u128));
        assert_eq!(config.round_delay, Duration::from_secs(1));
        assert!(config.max_rounds.is_none());

        let policy = FundingPolicy::default();
        assert_eq!(policy.min_native, U256::from(10_000_000_000_000_000u128));
        assert_eq!(policy.min_token, U256::from(2_000_000_000_000_000_000u128));
    }
}
