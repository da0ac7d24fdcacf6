//! CLI definition for the filler-wallets binary.

use std::path::PathBuf;

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use filler_cli_utils::LogArgs;
use url::Url;

/// Wallet tooling for block-filler.
#[derive(Debug, Clone, Parser)]
#[command(name = "filler-wallets")]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,

    /// Logging configuration arguments.
    #[command(flatten)]
    pub logging: LogArgs,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Command {
    /// Generate random wallets and print them as `.env` lines.
    Generate {
        /// Number of wallets to create.
        #[arg(default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,

        /// Seed for reproducible keys.
        #[arg(long)]
        seed: Option<u64>,

        /// Write the wallets to this JSON file.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print native and token balances of the funding wallet and the pool.
    Balances {
        /// JSON-RPC endpoint of the target node.
        #[arg(
            long = "rpc-url",
            env = "RPC_URL",
            default_value = "http://localhost:8545",
            value_parser = parse_url
        )]
        rpc_url: Url,

        /// ERC-20 contract to report balances for.
        #[arg(long = "token", env = "TOKEN_CONTRACT_ADDRESS", value_parser = parse_address)]
        token: Option<Address>,

        /// Private key of the funding wallet.
        #[arg(long = "funding-key", env = "FUNDING_WALLET_PRIVATE_KEY", hide_env_values = true)]
        funding_key: Option<String>,

        /// JSON wallets file. Falls back to `WALLET_<n>_PRIVATE_KEY` variables.
        #[arg(long = "wallets", env = "BLOCK_FILLER_WALLETS_FILE")]
        wallets: Option<PathBuf>,
    },
}

fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    s.parse()
}

fn parse_address(s: &str) -> Result<Address, alloy_primitives::hex::FromHexError> {
    s.parse()
}
