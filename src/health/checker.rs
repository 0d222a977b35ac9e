// src/health/checker.rs
use super::probe::Probe;
use crate::config::HealthCheckConfig;
use crate::metrics::MetricsCollector;
use crate::proxy::BackendPool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

/// Periodically probes every backend and rewrites its liveness flag.
///
/// The loop runs for the life of the process; `shutdown` (or dropping the
/// run task) is the only way out. Tests call `check_all` directly instead
/// of waiting on the timer.
pub struct HealthChecker {
    config: HealthCheckConfig,
    pool: Arc<BackendPool>,
    probe: Box<dyn Probe>,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HealthChecker {
    pub fn new(
        config: HealthCheckConfig,
        pool: Arc<BackendPool>,
        probe: Box<dyn Probe>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            pool,
            probe,
            metrics,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.config.interval());
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(interval = ?self.config.interval(), "starting health checker");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!("starting health check...");
                    self.check_all().await;
                    info!("health check completed");
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("health checker shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One tick: probe every backend in pool order and record the result.
    /// Probe failures are never retried within a tick.
    pub async fn check_all(&self) {
        for backend in self.pool.backends() {
            let alive = self.probe.probe(&backend.url, self.config.timeout()).await;
            let was_alive = backend.record_probe(alive).await;

            let status = if alive { "up" } else { "down" };
            info!("{} [{}]", backend.url, status);
            if was_alive && !alive {
                warn!(backend = %backend.url, "backend went down");
            }

            if let Some(metrics) = &self.metrics {
                metrics.set_backend_up(backend.url.as_str(), alive);
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_alive_backends(self.pool.alive_count().await, self.pool.len());
        }
    }
}
