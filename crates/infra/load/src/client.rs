//! The chain surface the engine depends on.

use std::fmt::Debug;

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;

use crate::{ClientResult, ReceiptSummary, TransferIntent, Wallet};

alloy_sol_types::sol! {
    /// Subset of ERC-20 used for load and funding.
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }
}

/// RPC operations used by the pool, the submitter and the round loop.
///
/// Implementations must be safe to call concurrently; a round fans out one call per
/// intent over a shared client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Debug + Send + Sync {
    /// The node's current legacy gas price.
    async fn gas_price(&self) -> ClientResult<u128>;

    /// Next nonce for `address`, counting pending transactions.
    async fn pending_nonce(&self, address: Address) -> ClientResult<u64>;

    /// Gas estimate for a token transfer.
    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> ClientResult<u64>;

    /// Signs and submits a token transfer exactly as described by `intent`.
    async fn send_transfer(&self, intent: &TransferIntent) -> ClientResult<TxHash>;

    /// Sends a token transfer, letting the client pick nonce, gas and price.
    async fn send_token(&self, from: &Wallet, to: Address, amount: U256) -> ClientResult<TxHash>;

    /// Sends native currency, letting the client pick nonce, gas and price.
    async fn send_native(&self, from: &Wallet, to: Address, value: U256) -> ClientResult<TxHash>;

    /// Blocks until `tx_hash` is mined.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ClientResult<ReceiptSummary>;

    /// Native balance of `address`.
    async fn native_balance(&self, address: Address) -> ClientResult<U256>;

    /// Token balance of `address`.
    async fn token_balance(&self, address: Address) -> ClientResult<U256>;
}
