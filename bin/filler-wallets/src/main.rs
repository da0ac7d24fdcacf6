//! Wallet tooling entry point.

mod cli;

use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use clap::Parser;
use cli::{Cli, Command};
use eyre::WrapErr;
use filler_cli_utils::RuntimeManager;
use filler_load::{
    AlloyChainClient, BalanceReport, Wallet, env_lines, generate_wallets, load_wallets,
    save_wallets, scan_env_wallets,
};
use tracing::{error, info};
use url::Url;

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(err) = cli.logging.init_tracing("filler-wallets.log") {
        eprintln!("failed to initialize tracing: {err:?}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Generate { count, seed, output } => {
            generate(count as usize, seed, output.as_deref())
        }
        Command::Balances { rpc_url, token, funding_key, wallets } => {
            balances(rpc_url, token, funding_key, wallets)
        }
    };

    if let Err(err) = result {
        error!(error = ?err, "filler-wallets failed");
        std::process::exit(1);
    }
}

fn generate(count: usize, seed: Option<u64>, output: Option<&Path>) -> eyre::Result<()> {
    let wallets = generate_wallets(count, seed);

    println!("Add these lines to your .env file:");
    println!("----------------------------------------");
    print!("{}", env_lines(&wallets));
    println!("----------------------------------------");

    if let Some(path) = output {
        save_wallets(&wallets, path)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        info!(count, path = %path.display(), "Saved wallets");
    }

    Ok(())
}

fn balances(
    rpc_url: Url,
    token: Option<Address>,
    funding_key: Option<String>,
    wallets_file: Option<PathBuf>,
) -> eyre::Result<()> {
    let funder = funding_key
        .as_deref()
        .map(|key| Wallet::from_private_key("FUNDING_WALLET_PRIVATE_KEY", key))
        .transpose()?;
    let wallets = match &wallets_file {
        Some(path) => load_wallets(path)?,
        None => scan_env_wallets(std::env::vars())?.into_iter().map(|(_, w)| w).collect(),
    };

    let rt = RuntimeManager::tokio_runtime()?;
    let report = rt.block_on(async {
        let client = AlloyChainClient::connect(rpc_url.as_str(), token.unwrap_or(Address::ZERO))
            .await
            .wrap_err_with(|| format!("failed to connect to {rpc_url}"))?;
        Ok::<_, eyre::Report>(
            BalanceReport::collect(&client, funder.as_ref(), &wallets, token.is_some()).await,
        )
    })?;

    print!("{report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        generate(3, Some(9), Some(&path)).unwrap();

        let loaded = load_wallets(&path).unwrap();
        let expected: Vec<_> = generate_wallets(3, Some(9)).iter().map(|w| w.address).collect();
        assert_eq!(loaded.iter().map(|w| w.address).collect::<Vec<_>>(), expected);
    }
}
