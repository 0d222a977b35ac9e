// src/proxy/backend.rs
use super::forwarder::{ForwardError, Forwarder};
use chrono::{DateTime, Utc};
use hyper::{Body, Request, Response};
use tokio::sync::RwLock;
use url::Url;

/// One upstream target: its address, a liveness flag, and the fixed
/// forwarding capability.
///
/// The liveness flag is read by every request and written by the
/// health-check loop on its own schedule, so it sits behind a
/// reader/writer lock: request handlers take shared reads concurrently,
/// the health checker (or a handler marking the backend dead after
/// exhausted retries) takes the exclusive write.
pub struct Backend {
    pub url: Url,
    alive: RwLock<bool>,
    forwarder: Box<dyn Forwarder>,
    last_probe: RwLock<Option<DateTime<Utc>>>,
}

impl Backend {
    /// Backends start alive; the first health tick corrects that if needed.
    pub fn new(url: Url, forwarder: Box<dyn Forwarder>) -> Self {
        Self {
            url,
            alive: RwLock::new(true),
            forwarder,
            last_probe: RwLock::new(None),
        }
    }

    pub async fn set_alive(&self, alive: bool) {
        *self.alive.write().await = alive;
    }

    pub async fn is_alive(&self) -> bool {
        *self.alive.read().await
    }

    /// Record a health-probe outcome; returns the previous liveness so the
    /// checker can log transitions.
    pub async fn record_probe(&self, alive: bool) -> bool {
        let was_alive = {
            let mut guard = self.alive.write().await;
            std::mem::replace(&mut *guard, alive)
        };
        *self.last_probe.write().await = Some(Utc::now());
        was_alive
    }

    pub async fn last_probe(&self) -> Option<DateTime<Utc>> {
        *self.last_probe.read().await
    }

    pub async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ForwardError> {
        self.forwarder.forward(req).await
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").field("url", &self.url).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::test_support::ScriptedForwarder;

    #[tokio::test]
    async fn liveness_defaults_to_true_and_flips() {
        let backend = Backend::new(
            "http://localhost:8081".parse().unwrap(),
            Box::new(ScriptedForwarder::always_ok()),
        );
        assert!(backend.is_alive().await);

        backend.set_alive(false).await;
        assert!(!backend.is_alive().await);

        backend.set_alive(true).await;
        assert!(backend.is_alive().await);
    }

    #[tokio::test]
    async fn record_probe_returns_previous_state_and_stamps_time() {
        let backend = Backend::new(
            "http://localhost:8081".parse().unwrap(),
            Box::new(ScriptedForwarder::always_ok()),
        );
        assert!(backend.last_probe().await.is_none());

        let was_alive = backend.record_probe(false).await;
        assert!(was_alive);
        assert!(!backend.is_alive().await);
        assert!(backend.last_probe().await.is_some());

        let was_alive = backend.record_probe(true).await;
        assert!(!was_alive);
        assert!(backend.is_alive().await);
    }
}
