// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        buffer
    }
}

pub struct MetricsCollector {
    // Request metrics
    pub requests_total: IntCounter,
    pub retries_total: IntCounter,
    pub failovers_total: IntCounter,

    // Backend metrics
    pub backend_requests_total: IntCounterVec,
    pub backend_up: IntGaugeVec,

    // Pool metrics
    pub alive_backends: IntGauge,
    pub total_backends: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total =
            IntCounter::new("lb_requests_total", "Total number of inbound requests")?;
        registry.register(Box::new(requests_total.clone()))?;

        let retries_total = IntCounter::new(
            "lb_retries_total",
            "Total same-backend retry rounds",
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let failovers_total = IntCounter::new(
            "lb_failovers_total",
            "Total attempt escalations after a backend was marked down",
        )?;
        registry.register(Box::new(failovers_total.clone()))?;

        let backend_requests_total = IntCounterVec::new(
            Opts::new("lb_backend_requests_total", "Total backend forwards"),
            &["backend", "status"],
        )?;
        registry.register(Box::new(backend_requests_total.clone()))?;

        let backend_up = IntGaugeVec::new(
            Opts::new("lb_backend_up", "Backend liveness (1=alive, 0=dead)"),
            &["backend"],
        )?;
        registry.register(Box::new(backend_up.clone()))?;

        let alive_backends =
            IntGauge::new("lb_alive_backends", "Number of alive backends")?;
        registry.register(Box::new(alive_backends.clone()))?;

        let total_backends =
            IntGauge::new("lb_total_backends", "Total number of backends")?;
        registry.register(Box::new(total_backends.clone()))?;

        Ok(Self {
            requests_total,
            retries_total,
            failovers_total,
            backend_requests_total,
            backend_up,
            alive_backends,
            total_backends,
        })
    }

    pub fn inc_requests(&self) {
        self.requests_total.inc();
    }

    pub fn inc_retries(&self) {
        self.retries_total.inc();
    }

    pub fn inc_failovers(&self) {
        self.failovers_total.inc();
    }

    pub fn record_backend_request(&self, backend: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.backend_requests_total
            .with_label_values(&[backend, status])
            .inc();
    }

    pub fn set_backend_up(&self, backend: &str, up: bool) {
        let value = if up { 1 } else { 0 };
        self.backend_up.with_label_values(&[backend]).set(value);
    }

    pub fn set_alive_backends(&self, alive: usize, total: usize) {
        self.alive_backends.set(alive as i64);
        self.total_backends.set(total as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_scrape_output() {
        let registry = MetricsRegistry::new().unwrap();
        let collector = registry.collector();

        collector.inc_requests();
        collector.inc_retries();
        collector.inc_failovers();
        collector.record_backend_request("http://backend-0:80/", true);
        collector.set_backend_up("http://backend-0:80/", false);
        collector.set_alive_backends(2, 3);

        let output = String::from_utf8(registry.gather()).unwrap();
        assert!(output.contains("lb_requests_total 1"));
        assert!(output.contains("lb_retries_total 1"));
        assert!(output.contains("lb_failovers_total 1"));
        assert!(output.contains("lb_alive_backends 2"));
        assert!(output.contains("lb_total_backends 3"));
    }
}
