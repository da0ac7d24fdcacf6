//! Block filler binary entry point.

mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, FillerArgs, MetricsArgs};
use eyre::WrapErr;
use filler_cli_utils::RuntimeManager;
use filler_load::{
    AlloyChainClient, LoadMetrics, MIN_WALLETS, PoolError, RoundLoop, Wallet, WalletPool,
    load_wallets, wallets_from_env,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(err) = cli.logging.init_tracing("block-filler.log") {
        eprintln!("failed to initialize tracing: {err:?}");
        std::process::exit(1);
    }

    if let Err(err) = run(cli) {
        error!(error = ?err, "block filler stopped with an error");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let num_wallets = cli.num_wallets as usize;
    let (args, metrics) = (cli.filler, cli.metrics);
    RuntimeManager::run_until_ctrl_c(move |cancel| fill_blocks(args, metrics, num_wallets, cancel))
}

/// Loads the pool, funds it and runs rounds until cancelled.
async fn fill_blocks(
    args: FillerArgs,
    metrics: MetricsArgs,
    num_wallets: usize,
    cancel: CancellationToken,
) -> eyre::Result<()> {
    metrics
        .config()
        .install(LoadMetrics::describe_all, cancel.clone())
        .wrap_err("failed to start metrics exporter")?;

    // Everything up to the connect call is local validation.
    let token = args.token.ok_or(PoolError::MissingTokenAddress)?;
    let wallets = pool_wallets(&args, num_wallets)?;
    let funder = args
        .funding_key
        .as_deref()
        .map(|key| Wallet::from_private_key("FUNDING_WALLET_PRIVATE_KEY", key))
        .transpose()?;
    if funder.is_none() {
        warn!("No funding wallet configured, underfunded wallets will be excluded");
    }

    let config = args.load_config();
    let client = AlloyChainClient::connect(args.rpc_url.as_str(), token)
        .await
        .wrap_err_with(|| format!("failed to connect to {}", args.rpc_url))?
        .with_receipt_poll_interval(config.receipt_poll_interval);
    info!(chain_id = client.chain_id(), %token, wallets = wallets.len(), "Connected");

    let client = Arc::new(client);
    let mut pool = WalletPool::new(Arc::clone(&client), wallets, funder, args.funding_policy())?;
    pool.fund_all().await?;

    let mut round_loop = RoundLoop::new(client, pool, config, cancel);
    let summary = round_loop.run().await?;
    info!(
        rounds = summary.rounds,
        sent = summary.sent,
        attempted = summary.attempted,
        insufficient_funds = summary.failures.insufficient_funds,
        gas_exceeds_allowance = summary.failures.gas_exceeds_allowance,
        underpriced = summary.failures.underpriced,
        reverted = summary.failures.reverted,
        unknown = summary.failures.unknown,
        elapsed_secs = summary.elapsed_secs,
        "Finished filling blocks"
    );

    Ok(())
}

/// The first `num_wallets` wallets from the wallets file, or from the environment.
fn pool_wallets(args: &FillerArgs, num_wallets: usize) -> eyre::Result<Vec<Wallet>> {
    let mut wallets = match &args.wallets {
        Some(path) => load_wallets(path)
            .wrap_err_with(|| format!("failed to load wallets from {}", path.display()))?,
        None => wallets_from_env(num_wallets, |name| std::env::var(name).ok())?,
    };
    wallets.truncate(num_wallets);

    if wallets.len() < MIN_WALLETS {
        return Err(
            PoolError::TooFewWallets { available: wallets.len(), required: MIN_WALLETS }.into()
        );
    }
    if wallets.len() < num_wallets {
        warn!(requested = num_wallets, found = wallets.len(), "Fewer wallets than requested");
    }

    Ok(wallets)
}
