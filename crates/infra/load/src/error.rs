//! Error types for the load engine.

use std::fmt;

use alloy_primitives::{Address, TxHash, U256};
use alloy_transport::TransportError;
use thiserror::Error;

/// Result alias for [`ChainClient`](crate::ChainClient) calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by the chain client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The node answered with an error or the transport failed.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The transaction could not be signed.
    #[error("failed to sign transaction: {0}")]
    Signing(String),
    /// A response could not be decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// Underlying decoder message.
        reason: String,
    },
    /// The client was configured with an unusable endpoint.
    #[error("invalid rpc url {url}: {reason}")]
    InvalidUrl {
        /// The rejected url.
        url: String,
        /// Parser message.
        reason: String,
    },
}

impl ClientError {
    /// The message used to classify the failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Rpc(msg) | Self::Signing(msg) => msg,
            Self::Decode { reason, .. } | Self::InvalidUrl { reason, .. } => reason,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        // Prefer the node's own message; it is what the classifier matches on.
        let message = err
            .as_error_resp()
            .map(|payload| payload.message.to_string())
            .unwrap_or_else(|| err.to_string());
        Self::Rpc(message)
    }
}

/// Why a send did not count as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The sender cannot pay for gas or value.
    InsufficientFunds,
    /// Execution needs more gas than the sender can cover.
    GasExceedsAllowance,
    /// The bid is below what the node accepts.
    Underpriced,
    /// The transaction was mined with a failed status.
    Reverted,
    /// Anything else.
    Unknown,
}

impl FailureReason {
    /// All reasons, in reporting order.
    pub const ALL: [Self; 5] = [
        Self::InsufficientFunds,
        Self::GasExceedsAllowance,
        Self::Underpriced,
        Self::Reverted,
        Self::Unknown,
    ];

    /// Classifies a node error message.
    pub fn classify(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        if message.contains("insufficient funds") {
            Self::InsufficientFunds
        } else if message.contains("gas required exceeds") {
            Self::GasExceedsAllowance
        } else if message.contains("underpriced") {
            Self::Underpriced
        } else if message.contains("reverted") {
            Self::Reverted
        } else {
            Self::Unknown
        }
    }

    /// Whether a higher gas price may help next round.
    pub const fn is_gas_related(self) -> bool {
        matches!(self, Self::InsufficientFunds | Self::GasExceedsAllowance | Self::Underpriced)
    }

    /// Stable label for logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientFunds => "insufficient_funds",
            Self::GasExceedsAllowance => "gas_exceeds_allowance",
            Self::Underpriced => "underpriced",
            Self::Reverted => "reverted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed send with its classified reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {message}")]
pub struct SendFailure {
    /// Classified reason.
    pub reason: FailureReason,
    /// Raw message reported by the node or transport.
    pub message: String,
}

impl SendFailure {
    /// Builds a failure from a client error, classifying its message.
    pub fn from_client(err: &ClientError) -> Self {
        Self { reason: FailureReason::classify(err.message()), message: err.to_string() }
    }
}

/// The asset a funding transfer tops up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    /// The chain's native currency.
    Native,
    /// The load token.
    Token,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Token => f.write_str("token"),
        }
    }
}

/// Errors raised while topping up a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundingError {
    /// The funding wallet cannot cover the shortfall.
    #[error("funding wallet {funder} holds {available} {asset} but {wallet} needs {required}")]
    InsufficientSource {
        /// Asset being topped up.
        asset: Asset,
        /// Funding wallet address.
        funder: Address,
        /// Wallet being funded.
        wallet: Address,
        /// Funder balance.
        available: U256,
        /// Shortfall of the funded wallet.
        required: U256,
    },
    /// A top-up is needed but no funding wallet was configured.
    #[error("{wallet} needs {required} {asset} but no funding wallet is configured")]
    NoFundingWallet {
        /// Asset being topped up.
        asset: Asset,
        /// Wallet being funded.
        wallet: Address,
        /// Shortfall of the funded wallet.
        required: U256,
    },
    /// The funding transfer was mined but failed.
    #[error("{asset} funding transfer {tx_hash} to {wallet} reverted")]
    Reverted {
        /// Asset being topped up.
        asset: Asset,
        /// Wallet being funded.
        wallet: Address,
        /// Hash of the reverted transfer.
        tx_hash: TxHash,
    },
    /// A chain call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Errors loading or persisting wallets.
#[derive(Debug, Error)]
pub enum WalletError {
    /// A private key could not be parsed.
    #[error("invalid private key for {label}: {reason}")]
    InvalidKey {
        /// Where the key came from.
        label: String,
        /// Parser message.
        reason: String,
    },
    /// The wallets file could not be read or written.
    #[error("wallets file io: {0}")]
    Io(#[from] std::io::Error),
    /// The wallets file is not valid JSON.
    #[error("wallets file format: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal pool setup errors.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Fewer wallets than a round needs.
    #[error("need at least {required} wallets, have {available}")]
    TooFewWallets {
        /// Wallets available.
        available: usize,
        /// Wallets required.
        required: usize,
    },
    /// No token contract address was configured.
    #[error("token contract address is not configured")]
    MissingTokenAddress,
    /// Wallet loading failed.
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Errors that stop the round loop.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The pool cannot support a round.
    #[error(transparent)]
    Pool(#[from] PoolError),
}
