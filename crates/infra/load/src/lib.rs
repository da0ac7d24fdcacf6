#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod error;
pub use error::{
    Asset, ClientError, ClientResult, FailureReason, FundingError, LoadError, PoolError,
    SendFailure, WalletError,
};

mod config;
pub use config::{FundingPolicy, LoadConfig, ONE_TOKEN};

mod wallet;
pub use wallet::{
    WALLET_KEY_ENV_PREFIX, Wallet, WalletData, WalletsFile, env_lines, generate_wallets,
    load_wallets, save_wallets, scan_env_wallets, wallets_from_env,
};

mod types;
pub use types::{BatchResult, ReceiptSummary, SendOutcome, SendRecord, TransferIntent};

mod client;
#[cfg(test)]
pub use client::MockChainClient;
pub use client::{ChainClient, IERC20};

mod provider;
pub use provider::AlloyChainClient;

mod gas;
pub use gas::{
    DECREASE_FACTOR, GasAdjustment, GasController, GasState, INCREASE_FACTOR, INITIAL_MULTIPLIER,
    MAX_MULTIPLIER, MAX_SUCCESS_RATE_PCT, MIN_MULTIPLIER, MIN_SUCCESS_RATE_PCT, STATS_WINDOW,
};

mod pool;
pub use pool::{FundingReceipt, MIN_WALLETS, NonceDrift, WalletPool};

mod batch;
pub use batch::{BatchSubmitter, nonce_range, pairings, target_index};

mod round;
pub use round::{LoopState, RoundLoop, RoundOutcome, StopReason};

mod stats;
pub use stats::{FailureCounts, RunSummary, Stats};

mod metrics;
pub use metrics::LoadMetrics;

mod balances;
pub use balances::{BalanceLine, BalanceReport, Balances};

#[cfg(any(test, feature = "test-utils"))]
mod test_utils;
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::FakeChain;
