//! One round of concurrent token transfers.
//!
//! Wallet `i` sends to wallet `(i + 1) % n`. Each sender's base nonce is read once,
//! then `burst_size` intents get the consecutive nonces `base..base + burst_size` before
//! anything is submitted. All intents of the round are then driven concurrently and the
//! round only completes once every one of them has resolved.

use std::{ops::Range, sync::Arc};

use alloy_primitives::{Address, TxHash, U256};
use futures::future::join_all;
use tracing::{debug, trace, warn};

use crate::{
    BatchResult, ChainClient, ClientError, FailureReason, LoadConfig, SendFailure, SendOutcome,
    SendRecord, TransferIntent, Wallet,
};

/// Index of the wallet that `sender` transfers to in a pool of `n`.
pub const fn target_index(sender: usize, n: usize) -> usize {
    (sender + 1) % n
}

/// Sender/recipient index pairs for a pool of `n`.
pub fn pairings(n: usize) -> Vec<(usize, usize)> {
    (0..n).map(|i| (i, target_index(i, n))).collect()
}

/// Nonces assigned to one burst.
pub const fn nonce_range(base: u64, burst_size: u64) -> Range<u64> {
    base..base + burst_size
}

/// Submits rounds of transfers over a shared [`ChainClient`].
#[derive(Debug)]
pub struct BatchSubmitter<C> {
    client: Arc<C>,
    burst_size: u64,
    base_gas_limit: u64,
    amount: U256,
    await_receipts: bool,
}

impl<C: ChainClient> BatchSubmitter<C> {
    /// Creates a submitter using the burst, gas and amount settings of `config`.
    pub fn new(client: Arc<C>, config: &LoadConfig) -> Self {
        Self {
            client,
            burst_size: config.burst_size,
            base_gas_limit: config.base_gas_limit,
            amount: config.amount,
            await_receipts: config.await_receipts,
        }
    }

    /// Runs one round over `wallets` at `gas_price` and waits for every send.
    ///
    /// Records are ordered by wallet, then nonce. A wallet whose base nonce could not be
    /// read contributes `burst_size` failures so the round total stays
    /// `wallets.len() * burst_size`.
    pub async fn submit_round(&self, wallets: &[Wallet], gas_price: u128) -> BatchResult {
        let n = wallets.len();
        if n == 0 {
            return BatchResult::default();
        }

        let base_nonces =
            join_all(wallets.iter().map(|w| self.client.pending_nonce(w.address))).await;

        let mut sends = Vec::with_capacity(n * self.burst_size as usize);
        let mut failed_lookups = Vec::new();
        let mut observed = Vec::with_capacity(n);

        for (i, (wallet, base)) in wallets.iter().zip(base_nonces).enumerate() {
            let to = wallets[target_index(i, n)].address;
            match base {
                Ok(base) => {
                    observed.push(Some(base));
                    for nonce in nonce_range(base, self.burst_size) {
                        sends.push(self.send_one(i, wallet, to, nonce, gas_price));
                    }
                }
                Err(err) => {
                    warn!(
                        target: "batch",
                        wallet = %wallet.address,
                        error = %err,
                        "Failed to fetch nonce, skipping burst"
                    );
                    observed.push(None);
                    failed_lookups.push((i, SendFailure::from_client(&err)));
                }
            }
        }

        debug!(target: "batch", intents = sends.len(), gas_price, "Dispatching round");
        let mut records = join_all(sends).await;

        for (i, failure) in failed_lookups {
            records.extend(nonce_range(0, self.burst_size).map(|offset| SendRecord {
                wallet_index: i,
                nonce: offset,
                outcome: SendOutcome::Failed(failure.clone()),
            }));
        }
        records.sort_by_key(|r| (r.wallet_index, r.nonce));

        BatchResult { records, base_nonces: observed }
    }

    async fn send_one(
        &self,
        wallet_index: usize,
        from: &Wallet,
        to: Address,
        nonce: u64,
        gas_price: u128,
    ) -> SendRecord {
        let gas_limit = self.gas_limit(from.address, to).await;
        let intent = TransferIntent {
            from: from.clone(),
            to,
            amount: self.amount,
            nonce,
            gas_limit,
            gas_price,
        };

        let outcome = match self.client.send_transfer(&intent).await {
            Ok(tx_hash) if self.await_receipts => self.confirm(tx_hash).await,
            Ok(tx_hash) => SendOutcome::Sent(tx_hash),
            Err(err) => SendOutcome::Failed(SendFailure::from_client(&err)),
        };

        match &outcome {
            SendOutcome::Sent(tx_hash) => {
                trace!(target: "batch", wallet = %from.address, nonce, %tx_hash, "Transfer sent");
            }
            SendOutcome::Failed(failure) if failure.reason.is_gas_related() => {
                warn!(
                    target: "batch",
                    wallet = %from.address,
                    nonce,
                    reason = %failure.reason,
                    error = %failure.message,
                    "Transfer failed on gas, bid may rise next batch"
                );
            }
            SendOutcome::Failed(failure) => {
                warn!(
                    target: "batch",
                    wallet = %from.address,
                    nonce,
                    reason = %failure.reason,
                    error = %failure.message,
                    "Transfer failed"
                );
            }
        }

        SendRecord { wallet_index, nonce, outcome }
    }

    /// The estimate raised to the configured floor, or the floor alone if estimation
    /// errors.
    async fn gas_limit(&self, from: Address, to: Address) -> u64 {
        match self.client.estimate_transfer_gas(from, to, self.amount).await {
            Ok(estimate) => estimate.max(self.base_gas_limit),
            Err(err) => {
                debug!(
                    target: "batch",
                    wallet = %from,
                    error = %err,
                    fallback = self.base_gas_limit,
                    "Gas estimation failed"
                );
                self.base_gas_limit
            }
        }
    }

    async fn confirm(&self, tx_hash: TxHash) -> SendOutcome {
        match self.client.wait_for_receipt(tx_hash).await {
            Ok(receipt) if receipt.status => SendOutcome::Sent(tx_hash),
            Ok(_) => SendOutcome::Failed(SendFailure {
                reason: FailureReason::Reverted,
                message: format!("transaction {tx_hash} reverted"),
            }),
            Err(err) => SendOutcome::Failed(receipt_failure(&err)),
        }
    }
}

fn receipt_failure(err: &ClientError) -> SendFailure {
    let mut failure = SendFailure::from_client(err);
    failure.message = format!("waiting for receipt: {}", failure.message);
    failure
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::{FakeChain, MockChainClient, ReceiptSummary, generate_wallets};

    fn config(burst_size: u64) -> LoadConfig {
        LoadConfig::default().with_burst_size(burst_size)
    }

    #[rstest]
    #[case(2, vec![(0, 1), (1, 0)])]
    #[case(3, vec![(0, 1), (1, 2), (2, 0)])]
    #[case(4, vec![(0, 1), (1, 2), (2, 3), (3, 0)])]
    fn round_robin_pairing(#[case] n: usize, #[case] expected: Vec<(usize, usize)>) {
        assert_eq!(pairings(n), expected);
    }

    #[test]
    fn burst_nonces_are_consecutive() {
        assert_eq!(nonce_range(7, 4).collect::<Vec<_>>(), vec![7, 8, 9, 10]);
        assert_eq!(nonce_range(0, 0).count(), 0);
    }

    #[rstest]
    #[case::estimate_below_floor(Some(21_000), 100_000)]
    #[case::estimate_above_floor(Some(180_000), 180_000)]
    #[case::estimation_fails(None, 100_000)]
    #[tokio::test]
    async fn chain_estimate_is_floored(#[case] estimate: Option<u64>, #[case] expected: u64) {
        let chain = Arc::new(FakeChain::new());
        let wallets = generate_wallets(2, Some(6));
        chain.set_gas_estimate(estimate);

        let submitter = BatchSubmitter::new(chain.clone(), &config(3));
        let result = submitter.submit_round(&wallets, 1).await;

        assert_eq!(result.successful(), 6);
        assert!(chain.sent().iter().all(|t| t.gas_limit == expected));
    }

    #[tokio::test]
    async fn two_wallets_issue_twenty_intents() {
        let chain = Arc::new(FakeChain::new());
        let wallets = generate_wallets(2, Some(1));
        chain.set_nonce(wallets[0].address, 4);
        chain.set_nonce(wallets[1].address, 0);

        let submitter = BatchSubmitter::new(chain.clone(), &config(10));
        let result = submitter.submit_round(&wallets, 1_000).await;

        assert_eq!(result.total(), 20);
        assert_eq!(result.successful(), 20);
        assert_eq!(result.base_nonces, vec![Some(4), Some(0)]);

        let sent = chain.sent();
        assert_eq!(sent.len(), 20);
        for (i, wallet) in wallets.iter().enumerate() {
            let mut nonces: Vec<_> =
                sent.iter().filter(|t| t.from.address == wallet.address).map(|t| t.nonce).collect();
            nonces.sort_unstable();
            let base = result.base_nonces[i].unwrap();
            assert_eq!(nonces, nonce_range(base, 10).collect::<Vec<_>>());
            assert!(
                sent.iter()
                    .filter(|t| t.from.address == wallet.address)
                    .all(|t| t.to == wallets[target_index(i, 2)].address)
            );
        }
    }

    #[tokio::test]
    async fn every_intent_uses_the_round_price() {
        let chain = Arc::new(FakeChain::new());
        let wallets = generate_wallets(3, Some(2));

        let submitter = BatchSubmitter::new(chain.clone(), &config(5));
        submitter.submit_round(&wallets, 1_234).await;

        let sent = chain.sent();
        assert_eq!(sent.len(), 15);
        assert!(sent.iter().all(|t| t.gas_price == 1_234));
    }

    #[tokio::test(start_paused = true)]
    async fn barrier_waits_for_slowest_send() {
        let chain = Arc::new(FakeChain::new());
        let wallets = generate_wallets(2, Some(3));
        chain.set_send_delay(wallets[1].address, Duration::from_secs(30));

        let submitter = BatchSubmitter::new(chain.clone(), &config(10));
        let start = tokio::time::Instant::now();
        let result = submitter.submit_round(&wallets, 1).await;

        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(result.total(), 20);
        assert_eq!(chain.sent().len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_send_stalls_the_round() {
        let chain = Arc::new(FakeChain::new());
        let wallets = generate_wallets(2, Some(4));
        chain.hang_sends_from(wallets[0].address);

        let submitter = BatchSubmitter::new(chain.clone(), &config(3));
        let round = tokio::time::timeout(
            Duration::from_secs(600),
            submitter.submit_round(&wallets, 1),
        )
        .await;

        assert!(round.is_err());
        assert_eq!(chain.sent().len(), 3);
    }

    #[tokio::test]
    async fn failures_are_classified_and_do_not_abort() {
        let chain = Arc::new(FakeChain::new());
        let wallets = generate_wallets(3, Some(5));
        chain.reject_sends_from(wallets[1].address, "transaction underpriced");
        chain.reject_sends_from(wallets[2].address, "insufficient funds for gas * price + value");

        let submitter = BatchSubmitter::new(chain.clone(), &config(4));
        let result = submitter.submit_round(&wallets, 1).await;

        assert_eq!(result.total(), 12);
        assert_eq!(result.successful(), 4);
        assert_eq!(result.failures(FailureReason::Underpriced), 4);
        assert_eq!(result.failures(FailureReason::InsufficientFunds), 4);
        assert!(result.records.iter().filter(|r| r.wallet_index == 0).all(|r| r.outcome.is_sent()));
    }

    #[tokio::test]
    async fn nonce_lookup_failure_counts_whole_burst() {
        let mut client = MockChainClient::new();
        let wallets = generate_wallets(2, Some(6));
        let broken = wallets[0].address;
        client.expect_pending_nonce().returning(move |addr| {
            if addr == broken { Err(ClientError::Rpc("timeout".into())) } else { Ok(9) }
        });
        client.expect_estimate_transfer_gas().returning(|_, _, _| Ok(50_000));
        client.expect_send_transfer().times(2).returning(|_| Ok(TxHash::repeat_byte(9)));

        let submitter = BatchSubmitter::new(Arc::new(client), &config(2));
        let result = submitter.submit_round(&wallets, 1).await;

        assert_eq!(result.total(), 4);
        assert_eq!(result.successful(), 2);
        assert_eq!(result.failures(FailureReason::Unknown), 2);
        assert_eq!(result.base_nonces, vec![None, Some(9)]);
        let order: Vec<_> = result.records.iter().map(|r| (r.wallet_index, r.nonce)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 9), (1, 10)]);
    }

    #[rstest]
    #[case::estimate_below_floor(Ok(21_000), 100_000)]
    #[case::estimate_above_floor(Ok(180_000), 180_000)]
    #[case::estimate_fails(Err("gas required exceeds allowance"), 100_000)]
    #[tokio::test]
    async fn gas_limit_respects_floor(
        #[case] estimate: Result<u64, &'static str>,
        #[case] expected: u64,
    ) {
        let mut client = MockChainClient::new();
        client.expect_pending_nonce().returning(|_| Ok(0));
        client.expect_estimate_transfer_gas().returning(move |_, _, _| {
            estimate.map_err(|e| ClientError::Rpc(e.to_string()))
        });
        client
            .expect_send_transfer()
            .withf(move |intent| intent.gas_limit == expected)
            .times(2)
            .returning(|_| Ok(TxHash::ZERO));

        let submitter = BatchSubmitter::new(Arc::new(client), &config(1));
        let result = submitter.submit_round(&generate_wallets(2, Some(7)), 1).await;
        assert_eq!(result.successful(), 2);
    }

    #[tokio::test]
    async fn reverted_receipt_counts_as_failure() {
        let mut client = MockChainClient::new();
        client.expect_pending_nonce().returning(|_| Ok(0));
        client.expect_estimate_transfer_gas().returning(|_, _, _| Ok(60_000));
        client
            .expect_send_transfer()
            .returning(|intent| Ok(TxHash::with_last_byte(intent.nonce as u8)));
        client.expect_wait_for_receipt().returning(|tx_hash| {
            Ok(ReceiptSummary { tx_hash, status: false, block_number: Some(3), gas_used: 30_000 })
        });

        let submitter =
            BatchSubmitter::new(Arc::new(client), &config(1).with_await_receipts(true));
        let result = submitter.submit_round(&generate_wallets(2, Some(8)), 1).await;

        assert_eq!(result.successful(), 0);
        assert_eq!(result.failures(FailureReason::Reverted), 2);
    }
}
