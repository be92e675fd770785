//! Metrics instrumentation
//!
//! Metrics are opt-in. When no `[metrics]` section is present in config,
//! no recorder is installed and the counter helpers are no-ops.
//!
//! ```toml
//! [metrics]
//! prometheus_bind = "127.0.0.1:9187"  # Serves /metrics while ingesting
//! ```

pub mod counters;
mod prometheus;

use crate::config::MetricsConfig;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to build Prometheus exporter: {0}")]
    PrometheusBuild(String),

    #[error("Failed to install metrics recorder: {0}")]
    Install(String),
}

/// Handle for the metrics subsystem
///
/// Keeps the Prometheus listener task alive until [`MetricsHandle::shutdown`].
pub struct MetricsHandle {
    exporter: Option<JoinHandle<()>>,
}

impl MetricsHandle {
    /// Create a disabled metrics handle (no-op)
    pub fn disabled() -> Self {
        Self { exporter: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.exporter.is_some()
    }

    /// Stop serving the metrics endpoint
    pub async fn shutdown(self) {
        if let Some(task) = self.exporter {
            task.abort();
            let _ = task.await;
            tracing::debug!("Prometheus metrics endpoint stopped");
        }
    }
}

/// Initialize metrics based on configuration
///
/// Must be called from within a tokio runtime. If `config` is `None`, or it
/// names no bind address, returns a disabled handle.
pub async fn init(config: Option<&MetricsConfig>) -> Result<MetricsHandle, MetricsError> {
    let Some(addr) = config.and_then(|c| c.prometheus_bind) else {
        tracing::debug!("Metrics disabled (no [metrics] prometheus_bind)");
        return Ok(MetricsHandle::disabled());
    };

    let exporter = prometheus::start_exporter(addr)?;
    tracing::info!(%addr, "Prometheus metrics endpoint started");

    Ok(MetricsHandle {
        exporter: Some(exporter),
    })
}
