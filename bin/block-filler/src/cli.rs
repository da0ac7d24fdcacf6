//! CLI definition for the block-filler binary.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use alloy_primitives::{Address, U256, utils::parse_ether};
use clap::{Args, Parser};
use filler_cli_utils::{LogArgs, MetricsConfig};
use filler_load::{FundingPolicy, LoadConfig};
use url::Url;

/// Block filler - saturates blocks with token transfers from a pool of funded wallets.
#[derive(Debug, Clone, Parser)]
#[command(name = "block-filler")]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Number of wallets to use (at least 2).
    #[arg(value_name = "NUM_WALLETS", value_parser = clap::value_parser!(u64).range(2..))]
    pub num_wallets: u64,

    /// Load generation arguments.
    #[command(flatten)]
    pub filler: FillerArgs,

    /// Logging configuration arguments.
    #[command(flatten)]
    pub logging: LogArgs,

    /// Metrics configuration arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,
}

/// Endpoint, wallet and load shape arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Load")]
pub(crate) struct FillerArgs {
    /// JSON-RPC endpoint of the target node.
    #[arg(
        long = "rpc-url",
        env = "RPC_URL",
        default_value = "http://localhost:8545",
        value_parser = parse_url
    )]
    pub rpc_url: Url,

    /// Address of the ERC-20 contract used for load.
    #[arg(long = "token", env = "TOKEN_CONTRACT_ADDRESS", value_parser = parse_address)]
    pub token: Option<Address>,

    /// Private key of the wallet that tops up the pool.
    #[arg(long = "funding-key", env = "FUNDING_WALLET_PRIVATE_KEY", hide_env_values = true)]
    pub funding_key: Option<String>,

    /// JSON wallets file. Falls back to `WALLET_<i>_PRIVATE_KEY` variables.
    #[arg(long = "wallets", env = "BLOCK_FILLER_WALLETS_FILE")]
    pub wallets: Option<PathBuf>,

    /// Transfers each wallet sends per round.
    #[arg(
        long = "burst-size",
        env = "BLOCK_FILLER_BURST_SIZE",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub burst_size: u64,

    /// Lower bound applied to every gas estimate.
    #[arg(long = "base-gas-limit", env = "BLOCK_FILLER_BASE_GAS_LIMIT", default_value = "100000")]
    pub base_gas_limit: u64,

    /// Tokens moved by each transfer, in whole units (e.g. "0.1").
    #[arg(
        long = "amount",
        env = "BLOCK_FILLER_AMOUNT",
        default_value = "0.1",
        value_parser = parse_units
    )]
    pub amount: U256,

    /// Minimum native balance a wallet needs before it joins, in whole units.
    #[arg(
        long = "min-native",
        env = "BLOCK_FILLER_MIN_NATIVE",
        default_value = "0.01",
        value_parser = parse_units
    )]
    pub min_native: U256,

    /// Minimum token balance a wallet needs before it joins, in whole units.
    #[arg(
        long = "min-token",
        env = "BLOCK_FILLER_MIN_TOKEN",
        default_value = "2",
        value_parser = parse_units
    )]
    pub min_token: U256,

    /// Pause between rounds in milliseconds.
    #[arg(long = "round-delay-ms", env = "BLOCK_FILLER_ROUND_DELAY_MS", default_value = "1000")]
    pub round_delay_ms: u64,

    /// Stop after this many rounds. Runs until Ctrl+C when unset.
    #[arg(long = "max-rounds", env = "BLOCK_FILLER_MAX_ROUNDS")]
    pub max_rounds: Option<u64>,

    /// Count a transfer only once its receipt reports success.
    #[arg(long = "await-receipts", env = "BLOCK_FILLER_AWAIT_RECEIPTS", default_value = "false")]
    pub await_receipts: bool,
}

/// Prometheus endpoint arguments.
#[derive(Debug, Clone, Args)]
#[command(next_help_heading = "Metrics")]
pub(crate) struct MetricsArgs {
    /// Serve Prometheus metrics on this address, e.g. `0.0.0.0:9464`.
    #[arg(long = "metrics", env = "BLOCK_FILLER_METRICS", value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Process metrics sampling interval in seconds.
    #[arg(
        long = "metrics-interval",
        env = "BLOCK_FILLER_METRICS_INTERVAL",
        default_value = "30"
    )]
    pub interval_secs: u64,
}

impl MetricsArgs {
    pub(crate) const fn config(&self) -> MetricsConfig {
        MetricsConfig {
            listen: self.listen,
            process_interval: Duration::from_secs(self.interval_secs),
        }
    }
}

impl FillerArgs {
    /// Engine settings.
    pub(crate) fn load_config(&self) -> LoadConfig {
        LoadConfig::default()
            .with_burst_size(self.burst_size)
            .with_base_gas_limit(self.base_gas_limit)
            .with_amount(self.amount)
            .with_round_delay(Duration::from_millis(self.round_delay_ms))
            .with_max_rounds(self.max_rounds)
            .with_await_receipts(self.await_receipts)
    }

    /// Funding thresholds.
    pub(crate) const fn funding_policy(&self) -> FundingPolicy {
        FundingPolicy { min_native: self.min_native, min_token: self.min_token }
    }
}

fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    s.parse()
}

fn parse_address(s: &str) -> Result<Address, alloy_primitives::hex::FromHexError> {
    s.parse()
}

fn parse_units(s: &str) -> Result<U256, String> {
    parse_ether(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, error::ErrorKind};
    use rstest::rstest;

    use super::*;

    const TOKEN: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn default_of(long: &str) -> Option<String> {
        Cli::command()
            .get_arguments()
            .find(|a| a.get_long() == Some(long))
            .and_then(|a| a.get_default_values().first().map(|v| v.to_string_lossy().into_owned()))
    }

    #[test]
    fn test_cli_explicit_args() {
        let cli = Cli::try_parse_from([
            "block-filler",
            "3",
            "--token",
            TOKEN,
            "--rpc-url",
            "http://node:8545",
            "--metrics",
            "127.0.0.1:9464",
        ])
        .unwrap();
        assert_eq!(cli.num_wallets, 3);
        assert_eq!(cli.filler.token, Some(TOKEN.parse().unwrap()));
        assert_eq!(cli.filler.rpc_url.host_str(), Some("node"));
        assert_eq!(cli.metrics.config().listen, Some("127.0.0.1:9464".parse().unwrap()));
    }

    #[rstest]
    #[case::burst_size("burst-size", "10")]
    #[case::base_gas_limit("base-gas-limit", "100000")]
    #[case::amount("amount", "0.1")]
    #[case::min_native("min-native", "0.01")]
    #[case::min_token("min-token", "2")]
    #[case::round_delay("round-delay-ms", "1000")]
    #[case::metrics_interval("metrics-interval", "30")]
    fn test_declared_defaults(#[case] long: &str, #[case] expected: &str) {
        assert_eq!(default_of(long).as_deref(), Some(expected));
    }

    #[test]
    fn test_declared_defaults_match_engine_defaults() {
        let config = LoadConfig::default();
        assert_eq!(default_of("burst-size"), Some(config.burst_size.to_string()));
        assert_eq!(default_of("base-gas-limit"), Some(config.base_gas_limit.to_string()));
        assert_eq!(
            parse_units(&default_of("amount").unwrap()).unwrap(),
            config.amount
        );
        assert_eq!(
            default_of("round-delay-ms"),
            Some(config.round_delay.as_millis().to_string())
        );

        let policy = FundingPolicy::default();
        assert_eq!(parse_units(&default_of("min-native").unwrap()).unwrap(), policy.min_native);
        assert_eq!(parse_units(&default_of("min-token").unwrap()).unwrap(), policy.min_token);
    }

    #[rstest]
    #[case::too_few(&["block-filler", "1"])]
    #[case::zero(&["block-filler", "0"])]
    #[case::negative(&["block-filler", "-4"])]
    #[case::not_a_number(&["block-filler", "many"])]
    #[case::missing(&["block-filler"])]
    fn test_rejects_bad_wallet_count(#[case] args: &[&str]) {
        let err = Cli::try_parse_from(args.iter().copied()).unwrap_err();
        assert_ne!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("0.1").unwrap(), U256::from(100_000_000_000_000_000u128));
        assert_eq!(parse_units("2").unwrap(), U256::from(2_000_000_000_000_000_000u128));
        assert!(parse_units("lots").is_err());
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(parse_address("0xnotanaddress").is_err());
    }

    #[test]
    fn test_overrides_flow_into_config() {
        let cli = Cli::try_parse_from([
            "block-filler",
            "5",
            "--burst-size",
            "25",
            "--round-delay-ms",
            "250",
            "--max-rounds",
            "7",
            "--await-receipts",
            "--amount",
            "1.5",
        ])
        .unwrap();

        let config = cli.filler.load_config();
        assert_eq!(config.burst_size, 25);
        assert_eq!(config.round_delay, Duration::from_millis(250));
        assert_eq!(config.max_rounds, Some(7));
        assert!(config.await_receipts);
        assert_eq!(config.amount, U256::from(1_500_000_000_000_000_000u128));
    }

    #[test]
    fn test_zero_burst_rejected() {
        assert!(Cli::try_parse_from(["block-filler", "2", "--burst-size", "0"]).is_err());
    }
}
