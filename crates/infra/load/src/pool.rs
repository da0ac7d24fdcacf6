//! Wallet pool and funding policy.

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, TxHash, U256};
use tracing::{debug, info, warn};

use crate::{Asset, BatchResult, ChainClient, FundingError, FundingPolicy, PoolError, Wallet};

/// Fewest wallets a round can pair.
pub const MIN_WALLETS: usize = 2;

/// Funding transfers made for one wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FundingReceipt {
    /// Native top-up transfer, if one was needed.
    pub native: Option<TxHash>,
    /// Token top-up transfer, if one was needed.
    pub token: Option<TxHash>,
}

impl FundingReceipt {
    /// Whether the wallet already met the policy.
    pub const fn already_funded(&self) -> bool {
        self.native.is_none() && self.token.is_none()
    }
}

/// A wallet whose pending nonce moved backwards between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceDrift {
    /// Wallet address.
    pub address: Address,
    /// Nonce the pool expected.
    pub expected: u64,
    /// Nonce the network reported.
    pub observed: u64,
}

/// Ordered wallet set plus the policy used to keep it funded.
///
/// Order is fixed at construction and defines round-robin pairing.
#[derive(Debug)]
pub struct WalletPool<C> {
    client: Arc<C>,
    wallets: Vec<Wallet>,
    active: Vec<bool>,
    funder: Option<Wallet>,
    policy: FundingPolicy,
    expected_nonces: HashMap<Address, u64>,
}

impl<C: ChainClient> WalletPool<C> {
    /// Builds a pool. Every wallet starts active.
    pub fn new(
        client: Arc<C>,
        wallets: Vec<Wallet>,
        funder: Option<Wallet>,
        policy: FundingPolicy,
    ) -> Result<Self, PoolError> {
        if wallets.len() < MIN_WALLETS {
            return Err(PoolError::TooFewWallets {
                available: wallets.len(),
                required: MIN_WALLETS,
            });
        }

        let active = vec![true; wallets.len()];
        Ok(Self { client, wallets, active, funder, policy, expected_nonces: HashMap::new() })
    }

    /// All wallets in pool order.
    pub fn list_wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    /// Wallets still taking part in rounds, in pool order.
    pub fn active_wallets(&self) -> Vec<Wallet> {
        self.wallets
            .iter()
            .zip(&self.active)
            .filter(|(_, active)| **active)
            .map(|(w, _)| w.clone())
            .collect()
    }

    /// Number of active wallets.
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    /// Tops `wallet` up to the policy minimums, waiting for each transfer to confirm.
    ///
    /// A wallet already at or above both minimums costs two balance reads and no
    /// transactions, so repeated calls are safe.
    pub async fn ensure_funded(&self, wallet: &Wallet) -> Result<FundingReceipt, FundingError> {
        let native_balance = self.client.native_balance(wallet.address).await?;
        let native = if native_balance < self.policy.min_native {
            let shortfall = self.policy.min_native - native_balance;
            Some(self.top_up(Asset::Native, wallet.address, shortfall).await?)
        } else {
            None
        };

        let token_balance = self.client.token_balance(wallet.address).await?;
        let token = if token_balance < self.policy.min_token {
            let shortfall = self.policy.min_token - token_balance;
            Some(self.top_up(Asset::Token, wallet.address, shortfall).await?)
        } else {
            None
        };

        Ok(FundingReceipt { native, token })
    }

    async fn top_up(
        &self,
        asset: Asset,
        wallet: Address,
        required: U256,
    ) -> Result<TxHash, FundingError> {
        let Some(funder) = &self.funder else {
            return Err(FundingError::NoFundingWallet { asset, wallet, required });
        };

        let available = match asset {
            Asset::Native => self.client.native_balance(funder.address).await?,
            Asset::Token => self.client.token_balance(funder.address).await?,
        };
        if available < required {
            return Err(FundingError::InsufficientSource {
                asset,
                funder: funder.address,
                wallet,
                available,
                required,
            });
        }

        info!(target: "pool", %wallet, %asset, amount = %required, "Funding wallet");
        let tx_hash = match asset {
            Asset::Native => self.client.send_native(funder, wallet, required).await?,
            Asset::Token => self.client.send_token(funder, wallet, required).await?,
        };

        let receipt = self.client.wait_for_receipt(tx_hash).await?;
        if !receipt.status {
            return Err(FundingError::Reverted { asset, wallet, tx_hash });
        }
        debug!(
            target: "pool",
            %wallet,
            %asset,
            %tx_hash,
            block = ?receipt.block_number,
            "Funding confirmed"
        );

        Ok(tx_hash)
    }

    /// Funds every wallet in order, excluding any that cannot be funded.
    ///
    /// Fails only if fewer than [`MIN_WALLETS`] remain active.
    pub async fn fund_all(&mut self) -> Result<usize, PoolError> {
        for i in 0..self.wallets.len() {
            let wallet = &self.wallets[i];
            match self.ensure_funded(wallet).await {
                Ok(receipt) => {
                    self.active[i] = true;
                    if receipt.already_funded() {
                        debug!(target: "pool", wallet = %wallet.address, "Wallet already funded");
                    }
                }
                Err(err) => {
                    warn!(
                        target: "pool",
                        wallet = %wallet.address,
                        index = i,
                        error = %err,
                        "Excluding wallet that could not be funded"
                    );
                    self.active[i] = false;
                }
            }
        }

        let active = self.active_count();
        if active < MIN_WALLETS {
            return Err(PoolError::TooFewWallets { available: active, required: MIN_WALLETS });
        }
        info!(target: "pool", active, total = self.wallets.len(), "Wallet pool ready");
        Ok(active)
    }

    /// Compares the round's observed base nonces with what earlier rounds left behind,
    /// then advances the cache past every accepted send.
    ///
    /// `wallets` must be the list the round ran with.
    pub fn reconcile_nonces(&mut self, wallets: &[Wallet], batch: &BatchResult) -> Vec<NonceDrift> {
        let mut drift = Vec::new();

        for (i, wallet) in wallets.iter().enumerate() {
            let Some(Some(base)) = batch.base_nonces.get(i).copied() else {
                continue;
            };

            if let Some(expected) = self.expected_nonces.get(&wallet.address).copied()
                && base < expected
            {
                warn!(
                    target: "pool",
                    wallet = %wallet.address,
                    expected,
                    observed = base,
                    "Pending nonce moved backwards, transactions were dropped"
                );
                drift.push(NonceDrift { address: wallet.address, expected, observed: base });
            }

            let next = batch
                .records
                .iter()
                .filter(|r| r.wallet_index == i && r.outcome.is_sent())
                .map(|r| r.nonce + 1)
                .max()
                .unwrap_or(base);
            self.expected_nonces.insert(wallet.address, next);
        }

        drift
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::TxHash;

    use super::*;
    use crate::{
        ClientError, MockChainClient, ReceiptSummary, SendFailure, SendOutcome, SendRecord,
        FailureReason, generate_wallets,
    };

    fn receipt(tx_hash: TxHash, status: bool) -> ReceiptSummary {
        ReceiptSummary { tx_hash, status, block_number: Some(1), gas_used: 21_000 }
    }

    fn pool(client: MockChainClient, wallets: usize, funder: bool) -> WalletPool<MockChainClient> {
        let mut all = generate_wallets(wallets + 1, Some(11));
        let funder = funder.then(|| all.remove(0));
        if funder.is_none() {
            all.remove(0);
        }
        WalletPool::new(Arc::new(client), all, funder, FundingPolicy::default()).unwrap()
    }

    #[test]
    fn rejects_single_wallet() {
        let err = WalletPool::new(
            Arc::new(MockChainClient::new()),
            generate_wallets(1, Some(1)),
            None,
            FundingPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PoolError::TooFewWallets { available: 1, required: 2 }));
    }

    #[tokio::test]
    async fn funded_wallet_sends_nothing() {
        let mut client = MockChainClient::new();
        client.expect_native_balance().returning(|_| Ok(U256::MAX));
        client.expect_token_balance().returning(|_| Ok(U256::MAX));
        client.expect_send_native().never();
        client.expect_send_token().never();

        let pool = pool(client, 2, true);
        let wallet = pool.list_wallets()[0].clone();
        let receipt = pool.ensure_funded(&wallet).await.unwrap();
        assert!(receipt.already_funded());
    }

    #[tokio::test]
    async fn tops_up_only_the_shortfall() {
        let policy = FundingPolicy::default();
        let min_native = policy.min_native;
        let min_token = policy.min_token;

        let mut client = MockChainClient::new();
        let wallets = generate_wallets(3, Some(11));
        let funder_addr = wallets[0].address;
        client.expect_native_balance().returning(move |addr| {
            Ok(if addr == funder_addr { U256::MAX } else { U256::from(1) })
        });
        client.expect_token_balance().returning(move |addr| {
            Ok(if addr == funder_addr { U256::MAX } else { min_token })
        });
        client
            .expect_send_native()
            .withf(move |_, _, value| *value == min_native - U256::from(1))
            .times(1)
            .returning(|_, _, _| Ok(TxHash::repeat_byte(1)));
        client.expect_send_token().never();
        client.expect_wait_for_receipt().returning(|hash| Ok(receipt(hash, true)));

        let pool = pool(client, 2, true);
        let wallet = pool.list_wallets()[0].clone();
        let funded = pool.ensure_funded(&wallet).await.unwrap();
        assert_eq!(funded.native, Some(TxHash::repeat_byte(1)));
        assert_eq!(funded.token, None);
    }

    #[tokio::test]
    async fn insufficient_source_is_reported() {
        let mut client = MockChainClient::new();
        client.expect_native_balance().returning(|_| Ok(U256::ZERO));
        client.expect_send_native().never();

        let pool = pool(client, 2, true);
        let wallet = pool.list_wallets()[0].clone();
        let err = pool.ensure_funded(&wallet).await.unwrap_err();
        assert!(matches!(err, FundingError::InsufficientSource { asset: Asset::Native, .. }));
    }

    #[tokio::test]
    async fn reverted_funding_is_an_error() {
        let mut client = MockChainClient::new();
        let wallets = generate_wallets(3, Some(11));
        let funder_addr = wallets[0].address;
        client.expect_native_balance().returning(|_| Ok(U256::MAX));
        client.expect_token_balance().returning(move |addr| {
            Ok(if addr == funder_addr { U256::MAX } else { U256::ZERO })
        });
        client.expect_send_token().returning(|_, _, _| Ok(TxHash::repeat_byte(2)));
        client.expect_wait_for_receipt().returning(|hash| Ok(receipt(hash, false)));

        let pool = pool(client, 2, true);
        let wallet = pool.list_wallets()[0].clone();
        let err = pool.ensure_funded(&wallet).await.unwrap_err();
        assert!(matches!(err, FundingError::Reverted { asset: Asset::Token, .. }));
    }

    #[tokio::test]
    async fn missing_funder_excludes_underfunded_wallets() {
        let mut client = MockChainClient::new();
        let wallets = generate_wallets(4, Some(11));
        let poor = wallets[1].address;
        client.expect_native_balance().returning(move |addr| {
            Ok(if addr == poor { U256::ZERO } else { U256::MAX })
        });
        client.expect_token_balance().returning(|_| Ok(U256::MAX));

        let mut pool = pool(client, 3, false);
        assert_eq!(pool.fund_all().await.unwrap(), 2);
        let active: Vec<_> = pool.active_wallets().iter().map(|w| w.address).collect();
        assert_eq!(active, vec![wallets[2].address, wallets[3].address]);
    }

    #[tokio::test]
    async fn too_few_funded_wallets_is_fatal() {
        let mut client = MockChainClient::new();
        client
            .expect_native_balance()
            .returning(|_| Err(ClientError::Rpc("connection refused".into())));

        let mut pool = pool(client, 2, true);
        let err = pool.fund_all().await.unwrap_err();
        assert!(matches!(err, PoolError::TooFewWallets { available: 0, .. }));
    }

    #[test]
    fn reconcile_detects_dropped_transactions() {
        let mut pool = pool(MockChainClient::new(), 2, false);
        let wallets = pool.active_wallets();

        let sent = |wallet_index, nonce| SendRecord {
            wallet_index,
            nonce,
            outcome: SendOutcome::Sent(TxHash::ZERO),
        };
        let failed = |wallet_index, nonce| SendRecord {
            wallet_index,
            nonce,
            outcome: SendOutcome::Failed(SendFailure {
                reason: FailureReason::Unknown,
                message: String::new(),
            }),
        };

        let first = BatchResult {
            records: vec![sent(0, 5), sent(0, 6), sent(1, 0), failed(1, 1)],
            base_nonces: vec![Some(5), Some(0)],
        };
        assert!(pool.reconcile_nonces(&wallets, &first).is_empty());

        let second = BatchResult { records: vec![], base_nonces: vec![Some(6), Some(1)] };
        let drift = pool.reconcile_nonces(&wallets, &second);
        assert_eq!(
            drift,
            vec![NonceDrift { address: wallets[0].address, expected: 7, observed: 6 }]
        );
    }
}
