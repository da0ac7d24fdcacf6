//! [`ChainClient`] backed by an alloy HTTP provider.

use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::{ReceiptResponse, TxSignerSync};
use alloy_primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, trace};
use url::Url;

use crate::{
    ChainClient, ClientError, ClientResult, IERC20, ReceiptSummary, TransferIntent, Wallet,
};

/// Gas limit for a plain native transfer.
const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Talks to a node over JSON-RPC, signing locally with legacy transactions.
#[derive(Debug, Clone)]
pub struct AlloyChainClient {
    provider: RootProvider,
    token: Address,
    chain_id: u64,
    receipt_poll_interval: Duration,
}

impl AlloyChainClient {
    /// Connects to `url` and reads the chain id.
    pub async fn connect(url: &str, token: Address) -> ClientResult<Self> {
        let parsed: Url = url
            .parse()
            .map_err(|e: url::ParseError| ClientError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let provider = ProviderBuilder::new().disable_recommended_fillers().connect_http(parsed);
        let chain_id = provider.get_chain_id().await?;
        debug!(target: "client", %url, chain_id, %token, "Connected to node");

        Ok(Self { provider, token, chain_id, receipt_poll_interval: Duration::from_millis(500) })
    }

    /// Sets how often [`ChainClient::wait_for_receipt`] polls.
    pub const fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    /// Chain id reported by the node at connect time.
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn sign_legacy(&self, wallet: &Wallet, mut tx: TxLegacy) -> ClientResult<Bytes> {
        let signature = wallet
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| ClientError::Signing(e.to_string()))?;

        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
        let mut buf = Vec::new();
        envelope.encode_2718(&mut buf);
        Ok(Bytes::from(buf))
    }

    async fn submit(&self, raw: Bytes) -> ClientResult<TxHash> {
        let pending = self.provider.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }

    fn transfer_input(to: Address, amount: U256) -> Bytes {
        IERC20::transferCall { to, amount }.abi_encode().into()
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn gas_price(&self) -> ClientResult<u128> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn pending_nonce(&self, address: Address) -> ClientResult<u64> {
        Ok(self.provider.get_transaction_count(address).pending().await?)
    }

    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> ClientResult<u64> {
        let tx = TransactionRequest::default()
            .from(from)
            .to(self.token)
            .input(TransactionInput::new(Self::transfer_input(to, amount)));
        Ok(self.provider.estimate_gas(tx).await?)
    }

    async fn send_transfer(&self, intent: &TransferIntent) -> ClientResult<TxHash> {
        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: intent.nonce,
            gas_price: intent.gas_price,
            gas_limit: intent.gas_limit,
            to: TxKind::Call(self.token),
            value: U256::ZERO,
            input: Self::transfer_input(intent.to, intent.amount),
        };
        let raw = self.sign_legacy(&intent.from, tx)?;
        let tx_hash = self.submit(raw).await?;
        trace!(
            target: "client",
            from = %intent.from.address,
            nonce = intent.nonce,
            %tx_hash,
            "Submitted transfer"
        );
        Ok(tx_hash)
    }

    async fn send_token(&self, from: &Wallet, to: Address, amount: U256) -> ClientResult<TxHash> {
        let nonce = self.pending_nonce(from.address).await?;
        let gas_price = self.gas_price().await?;
        let gas_limit = self.estimate_transfer_gas(from.address, to, amount).await?;

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(self.token),
            value: U256::ZERO,
            input: Self::transfer_input(to, amount),
        };
        let raw = self.sign_legacy(from, tx)?;
        self.submit(raw).await
    }

    async fn send_native(&self, from: &Wallet, to: Address, value: U256) -> ClientResult<TxHash> {
        let nonce = self.pending_nonce(from.address).await?;
        let gas_price = self.gas_price().await?;

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit: NATIVE_TRANSFER_GAS,
            to: TxKind::Call(to),
            value,
            input: Bytes::new(),
        };
        let raw = self.sign_legacy(from, tx)?;
        self.submit(raw).await
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ClientResult<ReceiptSummary> {
        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                return Ok(ReceiptSummary {
                    tx_hash,
                    status: receipt.status(),
                    block_number: receipt.block_number(),
                    gas_used: receipt.gas_used(),
                });
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    async fn native_balance(&self, address: Address) -> ClientResult<U256> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn token_balance(&self, address: Address) -> ClientResult<U256> {
        let tx = TransactionRequest::default().to(self.token).input(TransactionInput::new(
            IERC20::balanceOfCall { account: address }.abi_encode().into(),
        ));
        let output = self.provider.call(tx).await?;

        IERC20::balanceOfCall::abi_decode_returns(&output)
            .map_err(|e| ClientError::Decode { what: "balanceOf", reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_url() {
        let err = AlloyChainClient::connect("not a url", Address::ZERO).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { ref url, .. } if url == "not a url"));
    }

    #[test]
    fn transfer_calldata_uses_erc20_selector() {
        let input = AlloyChainClient::transfer_input(Address::repeat_byte(0x11), U256::from(5));
        assert_eq!(&input[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(input.len(), 4 + 32 * 2);
    }
}
