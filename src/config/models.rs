// src/config/models.rs
use anyhow::{bail, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the balancer listens on.
    pub listen_port: u16,
    /// Ordered backend list; the order defines the round-robin sequence.
    pub backends: Vec<Url>,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Max same-backend retry rounds within one attempt.
    #[serde(default = "default_max")]
    pub max_retries: u32,
    /// Max distinct backend-selection rounds per request.
    #[serde(default = "default_max")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_probe_timeout_secs() -> u64 {
    2
}

fn default_max() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    10
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max(),
            max_attempts: default_max(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    /// Startup misconfiguration is fatal; the process must not serve with an
    /// empty or unusable backend list.
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            bail!("Please provide one or more backends");
        }
        for url in &self.backends {
            if url.host_str().is_none() {
                bail!("Backend URL has no host: {}", url);
            }
        }
        Ok(())
    }
}
