//! Tokio runtime helpers with cooperative Ctrl+C shutdown.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A runtime manager.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeManager;

impl RuntimeManager {
    /// Creates a multi-thread tokio runtime with all features enabled.
    pub fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    }

    /// Runs `f` to completion on a fresh runtime.
    ///
    /// The token handed to `f` is cancelled on the first Ctrl+C. The future is still
    /// awaited afterwards so work in flight can drain.
    pub fn run_until_ctrl_c<F, Fut>(f: F) -> eyre::Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = eyre::Result<()>>,
    {
        let rt = Self::tokio_runtime().map_err(|e| eyre::eyre!(e))?;
        rt.block_on(async move {
            let shutdown = CancellationToken::new();
            let watcher = tokio::spawn(Self::cancel_on_ctrl_c(shutdown.clone()));

            let res = f(shutdown.clone()).await;

            shutdown.cancel();
            watcher.abort();
            res
        })
    }

    /// Cancels `token` once Ctrl+C is received.
    pub async fn cancel_on_ctrl_c(token: CancellationToken) {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            res = tokio::signal::ctrl_c() => {
                match res {
                    Ok(()) => info!(target: "cli", "Received Ctrl-C, finishing in-flight work..."),
                    Err(e) => warn!(target: "cli", error = %e, "Failed to listen for Ctrl-C"),
                }
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_until_ctrl_c_returns_future_result() {
        let res = RuntimeManager::run_until_ctrl_c(|token| async move {
            assert!(!token.is_cancelled());
            Ok(())
        });
        assert!(res.is_ok());

        let res = RuntimeManager::run_until_ctrl_c(|_| async { Err(eyre::eyre!("boom")) });
        assert_eq!(res.unwrap_err().to_string(), "boom");
    }

    #[tokio::test]
    async fn watcher_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        let watcher = tokio::spawn(RuntimeManager::cancel_on_ctrl_c(token.clone()));
        token.cancel();
        watcher.await.unwrap();
    }
}
