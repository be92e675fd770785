//! Prometheus HTTP endpoint for /metrics

use super::MetricsError;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::task::JoinHandle;

/// Install the global recorder and serve it over plaintext HTTP
pub(super) fn start_exporter(addr: SocketAddr) -> Result<JoinHandle<()>, MetricsError> {
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .build()
        .map_err(|e| MetricsError::PrometheusBuild(e.to_string()))?;

    metrics::set_global_recorder(recorder).map_err(|e| MetricsError::Install(e.to_string()))?;

    Ok(tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "Prometheus exporter stopped");
        }
    }))
}
