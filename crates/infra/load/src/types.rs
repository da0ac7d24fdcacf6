//! Per-send and per-round data.

use alloy_primitives::{Address, TxHash, U256};

use crate::{FailureReason, SendFailure, Wallet};

/// A single token transfer to attempt. Built per send and dropped once it resolves.
#[derive(Debug, Clone)]
pub struct TransferIntent {
    /// Sending wallet.
    pub from: Wallet,
    /// Recipient address.
    pub to: Address,
    /// Token amount.
    pub amount: U256,
    /// Pre-assigned nonce.
    pub nonce: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Legacy gas price bid.
    pub gas_price: u128,
}

/// Summary of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Whether execution succeeded.
    pub status: bool,
    /// Block the transaction was mined in.
    pub block_number: Option<u64>,
    /// Gas consumed.
    pub gas_used: u64,
}

/// How one send resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the node.
    Sent(TxHash),
    /// Rejected, reverted or never submitted.
    Failed(SendFailure),
}

impl SendOutcome {
    /// Whether this counts as a success.
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }

    /// The failure reason, if any.
    pub const fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Sent(_) => None,
            Self::Failed(failure) => Some(failure.reason),
        }
    }
}

/// Outcome of one send within a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRecord {
    /// Index of the sending wallet in the round's wallet list.
    pub wallet_index: usize,
    /// Nonce the send used.
    pub nonce: u64,
    /// How it resolved.
    pub outcome: SendOutcome,
}

/// Everything one round produced, ordered by wallet then nonce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// One record per intent.
    pub records: Vec<SendRecord>,
    /// Base nonce observed per wallet, `None` where the lookup failed.
    pub base_nonces: Vec<Option<u64>>,
}

impl BatchResult {
    /// Number of sends that counted as successes.
    pub fn successful(&self) -> u64 {
        self.records.iter().filter(|r| r.outcome.is_sent()).count() as u64
    }

    /// Number of intents in the round.
    pub fn total(&self) -> u64 {
        self.records.len() as u64
    }

    /// Number of failures with the given reason.
    pub fn failures(&self, reason: FailureReason) -> u64 {
        self.records.iter().filter(|r| r.outcome.failure_reason() == Some(reason)).count() as u64
    }
}
