//! Prometheus endpoint.

use std::{net::SocketAddr, time::Duration};

pub use metrics_exporter_prometheus::BuildError;
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_process::Collector;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Where metrics are served, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Listen address of the scrape endpoint. `None` keeps metrics disabled.
    pub listen: Option<SocketAddr>,
    /// How often process metrics are sampled.
    pub process_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { listen: None, process_interval: Duration::from_secs(30) }
    }
}

impl MetricsConfig {
    /// Installs the global recorder and the scrape endpoint, registers descriptions via
    /// `describe`, and samples process metrics until `cancel` fires.
    ///
    /// Must be called from within a tokio runtime. Returns the bound address, or `None`
    /// when metrics are disabled.
    pub fn install<F>(
        &self,
        describe: F,
        cancel: CancellationToken,
    ) -> Result<Option<SocketAddr>, BuildError>
    where
        F: FnOnce(),
    {
        let Some(listen) = self.listen else {
            return Ok(None);
        };

        PrometheusBuilder::new().with_http_listener(listen).install()?;

        let collector = Collector::default();
        collector.describe();
        describe();

        let period = self.process_interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => collector.collect(),
                }
            }
        });

        info!(target: "prometheus", addr = %listen, "Serving metrics");
        Ok(Some(listen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_config_installs_nothing() {
        let mut described = false;
        let bound = MetricsConfig::default()
            .install(|| described = true, CancellationToken::new())
            .unwrap();

        assert_eq!(bound, None);
        assert!(!described);
    }
}
