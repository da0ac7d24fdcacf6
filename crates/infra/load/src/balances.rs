//! Balance report for the funding wallet and the pool.

use std::fmt;

use alloy_primitives::{Address, U256, utils::format_ether};

use crate::{ChainClient, ClientError, Wallet};

/// Balances of one wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balances {
    /// Native balance.
    pub native: U256,
    /// Token balance, when a token was queried.
    pub token: Option<U256>,
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceLine {
    /// Display label, e.g. `Wallet 3`.
    pub label: String,
    /// Wallet address.
    pub address: Address,
    /// Balances, or the error hit while reading them.
    pub balances: Result<Balances, ClientError>,
}

/// Balances of the funding wallet and every pool wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceReport {
    /// Funding wallet line, if one is configured.
    pub funder: Option<BalanceLine>,
    /// Pool wallet lines, in pool order.
    pub wallets: Vec<BalanceLine>,
}

impl BalanceReport {
    /// Reads balances for `funder` and `wallets`. Per-wallet errors are kept in the
    /// report rather than aborting it.
    pub async fn collect<C: ChainClient>(
        client: &C,
        funder: Option<&Wallet>,
        wallets: &[Wallet],
        include_token: bool,
    ) -> Self {
        let funder = match funder {
            Some(w) => {
                let label = "Funding wallet".to_string();
                Some(Self::line(client, label, w.address, include_token).await)
            }
            None => None,
        };

        let mut lines = Vec::with_capacity(wallets.len());
        for (i, wallet) in wallets.iter().enumerate() {
            lines.push(
                Self::line(client, format!("Wallet {}", i + 1), wallet.address, include_token)
                    .await,
            );
        }

        Self { funder, wallets: lines }
    }

    async fn line<C: ChainClient>(
        client: &C,
        label: String,
        address: Address,
        include_token: bool,
    ) -> BalanceLine {
        let balances = async {
            let native = client.native_balance(address).await?;
            let token =
                if include_token { Some(client.token_balance(address).await?) } else { None };
            Ok::<_, ClientError>(Balances { native, token })
        }
        .await;

        BalanceLine { label, address, balances }
    }

    /// Sum of native balances across pool wallets that could be read.
    pub fn total_native(&self) -> U256 {
        self.readable().map(|b| b.native).fold(U256::ZERO, |acc, v| acc.saturating_add(v))
    }

    /// Sum of token balances across pool wallets that could be read.
    pub fn total_token(&self) -> U256 {
        self.readable()
            .filter_map(|b| b.token)
            .fold(U256::ZERO, |acc, v| acc.saturating_add(v))
    }

    fn readable(&self) -> impl Iterator<Item = &Balances> {
        self.wallets.iter().filter_map(|line| line.balances.as_ref().ok())
    }
}

impl fmt::Display for BalanceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        writeln!(f, "  Address: {}", self.address)?;
        match &self.balances {
            Ok(balances) => {
                writeln!(f, "  Native:  {}", format_ether(balances.native))?;
                if let Some(token) = balances.token {
                    writeln!(f, "  Token:   {}", format_ether(token))?;
                }
                Ok(())
            }
            Err(err) => writeln!(f, "  Error:   {err}"),
        }
    }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.funder {
            Some(line) => write!(f, "{line}")?,
            None => writeln!(f, "No funding wallet configured")?,
        }
        writeln!(f)?;
        for line in &self.wallets {
            write!(f, "{line}")?;
        }
        writeln!(f, "--------------------")?;
        writeln!(f, "Total native across wallets: {}", format_ether(self.total_native()))?;
        if self.wallets.iter().any(|l| matches!(&l.balances, Ok(b) if b.token.is_some())) {
            writeln!(f, "Total token across wallets:  {}", format_ether(self.total_token()))?;
        }
        Ok(())
    }
}
