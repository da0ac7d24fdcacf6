//! In-memory chain for exercising the engine without a node.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use alloy_primitives::{Address, TxHash, U256, keccak256};
use async_trait::async_trait;

use crate::{ChainClient, ClientError, ClientResult, ReceiptSummary, TransferIntent, Wallet};

#[derive(Debug)]
struct FakeState {
    gas_price: Option<u128>,
    gas_estimate: Option<u64>,
    nonces: HashMap<Address, u64>,
    native: HashMap<Address, U256>,
    token: HashMap<Address, U256>,
    rejections: HashMap<Address, String>,
    delays: HashMap<Address, Duration>,
    hung: HashSet<Address>,
    revert_receipts: bool,
    sent: Vec<TransferIntent>,
    gas_price_calls: u64,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            gas_price: Some(1_000_000_000),
            gas_estimate: Some(52_000),
            nonces: HashMap::new(),
            native: HashMap::new(),
            token: HashMap::new(),
            rejections: HashMap::new(),
            delays: HashMap::new(),
            hung: HashSet::new(),
            revert_receipts: false,
            sent: Vec::new(),
            gas_price_calls: 0,
        }
    }
}

/// A [`ChainClient`] that accepts every transfer unless told otherwise.
///
/// Accepted transfers advance the sender's pending nonce. Native and token sends move
/// balances immediately and always confirm.
#[derive(Debug, Default)]
pub struct FakeChain {
    state: Mutex<FakeState>,
}

impl FakeChain {
    /// A chain with a 1 gwei base price and no balances.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    /// Sets the base price; `None` makes price queries fail.
    pub fn set_gas_price(&self, price: Option<u128>) {
        self.with_state(|s| s.gas_price = price);
    }

    /// Sets the gas estimate; `None` makes estimation fail.
    pub fn set_gas_estimate(&self, estimate: Option<u64>) {
        self.with_state(|s| s.gas_estimate = estimate);
    }

    /// Sets the pending nonce of `address`.
    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.with_state(|s| s.nonces.insert(address, nonce));
    }

    /// Sets the native balance of `address`.
    pub fn set_native_balance(&self, address: Address, balance: U256) {
        self.with_state(|s| s.native.insert(address, balance));
    }

    /// Sets the token balance of `address`.
    pub fn set_token_balance(&self, address: Address, balance: U256) {
        self.with_state(|s| s.token.insert(address, balance));
    }

    /// Rejects every transfer from `address` with `message`.
    pub fn reject_sends_from(&self, address: Address, message: &str) {
        self.with_state(|s| s.rejections.insert(address, message.to_string()));
    }

    /// Delays every transfer from `address`.
    pub fn set_send_delay(&self, address: Address, delay: Duration) {
        self.with_state(|s| s.delays.insert(address, delay));
    }

    /// Makes every transfer from `address` wait forever.
    pub fn hang_sends_from(&self, address: Address) {
        self.with_state(|s| s.hung.insert(address));
    }

    /// Makes receipts for transfers report a failed status.
    pub fn revert_receipts(&self, revert: bool) {
        self.with_state(|s| s.revert_receipts = revert);
    }

    /// Drops accepted transfers from `address`, rewinding its pending nonce.
    pub fn drop_pending(&self, address: Address, nonce: u64) {
        self.with_state(|s| {
            s.nonces.insert(address, nonce);
            s.sent.retain(|t| t.from.address != address || t.nonce < nonce);
        });
    }

    /// Transfers accepted so far, in submission order.
    pub fn sent(&self) -> Vec<TransferIntent> {
        self.with_state(|s| s.sent.clone())
    }

    /// Number of base price queries.
    pub fn gas_price_calls(&self) -> u64 {
        self.with_state(|s| s.gas_price_calls)
    }

    fn tx_hash(from: Address, nonce: u64) -> TxHash {
        let mut buf = from.to_vec();
        buf.extend_from_slice(&nonce.to_be_bytes());
        keccak256(buf)
    }

    fn transfer(balances: &mut HashMap<Address, U256>, from: Address, to: Address, value: U256) {
        let source = balances.entry(from).or_default();
        *source = source.saturating_sub(value);
        *balances.entry(to).or_default() += value;
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn gas_price(&self) -> ClientResult<u128> {
        self.with_state(|s| {
            s.gas_price_calls += 1;
            s.gas_price.ok_or_else(|| ClientError::Rpc("gas price unavailable".into()))
        })
    }

    async fn pending_nonce(&self, address: Address) -> ClientResult<u64> {
        Ok(self.with_state(|s| s.nonces.get(&address).copied().unwrap_or_default()))
    }

    async fn estimate_transfer_gas(
        &self,
        _from: Address,
        _to: Address,
        _amount: U256,
    ) -> ClientResult<u64> {
        self.with_state(|s| {
            s.gas_estimate.ok_or_else(|| ClientError::Rpc("execution reverted".into()))
        })
    }

    async fn send_transfer(&self, intent: &TransferIntent) -> ClientResult<TxHash> {
        let from = intent.from.address;
        let (delay, hung) =
            self.with_state(|s| (s.delays.get(&from).copied(), s.hung.contains(&from)));
        if hung {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.with_state(|s| {
            if let Some(message) = s.rejections.get(&from) {
                return Err(ClientError::Rpc(message.clone()));
            }
            let next = s.nonces.entry(from).or_default();
            *next = (*next).max(intent.nonce + 1);
            s.sent.push(intent.clone());
            Ok(Self::tx_hash(from, intent.nonce))
        })
    }

    async fn send_token(&self, from: &Wallet, to: Address, amount: U256) -> ClientResult<TxHash> {
        self.with_state(|s| {
            let nonce = s.nonces.entry(from.address).or_default();
            let hash = Self::tx_hash(from.address, *nonce);
            *nonce += 1;
            Self::transfer(&mut s.token, from.address, to, amount);
            Ok(hash)
        })
    }

    async fn send_native(&self, from: &Wallet, to: Address, value: U256) -> ClientResult<TxHash> {
        self.with_state(|s| {
            let nonce = s.nonces.entry(from.address).or_default();
            let hash = Self::tx_hash(from.address, *nonce);
            *nonce += 1;
            Self::transfer(&mut s.native, from.address, to, value);
            Ok(hash)
        })
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ClientResult<ReceiptSummary> {
        let status = self.with_state(|s| !s.revert_receipts);
        Ok(ReceiptSummary { tx_hash, status, block_number: Some(1), gas_used: 52_000 })
    }

    async fn native_balance(&self, address: Address) -> ClientResult<U256> {
        Ok(self.with_state(|s| s.native.get(&address).copied().unwrap_or_default()))
    }

    async fn token_balance(&self, address: Address) -> ClientResult<U256> {
        Ok(self.with_state(|s| s.token.get(&address).copied().unwrap_or_default()))
    }
}
