// src/proxy/router.rs
// Per-request routing: pick a live peer, forward, and drive the bounded
// retry/failover protocol when forwarding fails.
use super::pool::BackendPool;
use crate::config::RetryConfig;
use crate::metrics::MetricsCollector;
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::http::request::Parts;
use hyper::{Body, Request, Response, StatusCode};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("maximum forwarding attempts reached")]
    AttemptsExhausted,

    #[error("no alive backend in the pool")]
    NoAliveBackend,

    #[error("failed to buffer request body: {0}")]
    ClientBody(#[from] hyper::Error),
}

impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let (status, message) = match err {
            ProxyError::AttemptsExhausted => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service is currently not available")
            }
            ProxyError::NoAliveBackend => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service not available")
            }
            ProxyError::ClientBody(_) => (StatusCode::BAD_REQUEST, "Bad request"),
        };

        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(message))
            .unwrap()
    }
}

/// Per-request escalation counters, passed by value through the routing
/// loop. `attempts` counts distinct backend-selection rounds (starting at
/// 1); `retries` counts same-backend re-forwards within the current
/// attempt. Requests never share state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptState {
    pub attempts: u32,
    pub retries: u32,
}

impl AttemptState {
    pub fn new() -> Self {
        Self {
            attempts: 1,
            retries: 0,
        }
    }

    fn next_retry(self) -> Self {
        Self {
            retries: self.retries + 1,
            ..self
        }
    }

    fn next_attempt(self) -> Self {
        Self {
            attempts: self.attempts + 1,
            retries: 0,
        }
    }
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Router {
    pool: Arc<BackendPool>,
    config: RetryConfig,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Router {
    pub fn new(
        pool: Arc<BackendPool>,
        config: RetryConfig,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            pool,
            config,
            metrics,
        }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Entry point per inbound request; always produces a response.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "request",
            %request_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        match self.route(req).instrument(span).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(%request_id, %err, "request failed");
                err.into()
            }
        }
    }

    /// The retry/failover state machine.
    ///
    /// Outer loop: one iteration per backend-selection round. Inner loop:
    /// bounded same-backend re-forwards. Exhausting the retry budget marks
    /// the backend dead and escalates to a fresh selection; exhausting the
    /// attempt budget (or the pool) is terminal.
    pub async fn route(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_requests();
        }

        // Hyper bodies are single-shot; buffer once so retries and
        // failover re-forwards can replay it.
        let (parts, body) = req.into_parts();
        let body = hyper::body::to_bytes(body).await?;

        let mut state = AttemptState::new();
        loop {
            if state.attempts > self.config.max_attempts {
                warn!(attempts = state.attempts, "max attempts reached");
                return Err(ProxyError::AttemptsExhausted);
            }

            let peer = match self.pool.select_peer().await {
                Some(peer) => peer,
                None => {
                    warn!("no alive backend available");
                    return Err(ProxyError::NoAliveBackend);
                }
            };

            loop {
                match peer.forward(rebuild_request(&parts, &body)).await {
                    Ok(resp) => {
                        debug!(
                            backend = %peer.url,
                            status = %resp.status(),
                            attempts = state.attempts,
                            retries = state.retries,
                            "forwarded",
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.record_backend_request(peer.url.as_str(), true);
                        }
                        return Ok(resp);
                    }
                    Err(err) => {
                        warn!(backend = %peer.url, %err, "forward failed");
                        if let Some(metrics) = &self.metrics {
                            metrics.record_backend_request(peer.url.as_str(), false);
                        }

                        if state.retries < self.config.max_retries {
                            // Brief fixed pause so a transient failure is
                            // not hammered in a hot loop.
                            sleep(self.config.retry_delay()).await;
                            state = state.next_retry();
                            if let Some(metrics) = &self.metrics {
                                metrics.inc_retries();
                            }
                            continue;
                        }

                        // Retry budget spent: take this backend out of
                        // rotation and escalate to a fresh selection.
                        self.pool.mark_backend_status(&peer.url, false).await;
                        info!(
                            backend = %peer.url,
                            attempts = state.attempts,
                            "backend marked down, reselecting",
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.inc_failovers();
                            metrics.set_backend_up(peer.url.as_str(), false);
                        }
                        state = state.next_attempt();
                        break;
                    }
                }
            }
        }
    }
}

fn rebuild_request(parts: &Parts, body: &Bytes) -> Request<Body> {
    let mut req = Request::new(Body::from(body.clone()));
    *req.method_mut() = parts.method.clone();
    *req.uri_mut() = parts.uri.clone();
    *req.version_mut() = parts.version;
    *req.headers_mut() = parts.headers.clone();
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::test_support::ScriptedForwarder;
    use crate::proxy::Backend;

    fn pool_with(scripts: Vec<ScriptedForwarder>) -> Arc<BackendPool> {
        let backends = scripts
            .into_iter()
            .enumerate()
            .map(|(i, script)| {
                Arc::new(Backend::new(
                    format!("http://backend-{}:80", i).parse().unwrap(),
                    Box::new(script),
                ))
            })
            .collect();
        Arc::new(BackendPool::new(backends))
    }

    fn router(pool: Arc<BackendPool>) -> Router {
        Router::new(pool, RetryConfig::default(), None)
    }

    fn get_request() -> Request<Body> {
        Request::get("http://lb.local/some/path").body(Body::empty()).unwrap()
    }

    async fn body_text(resp: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn two_transient_failures_recover_on_the_same_backend() {
        let pool = pool_with(vec![ScriptedForwarder::fail_first(2)]);
        let router = router(pool.clone());

        let resp = router.route(get_request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        // Two retries consumed, third forward succeeded; the backend was
        // never marked dead and no attempt escalation happened.
        assert!(pool.backends()[0].is_alive().await);
        assert_eq!(pool.alive_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_kills_every_backend_then_503s() {
        let pool = pool_with(vec![
            ScriptedForwarder::always_fail(),
            ScriptedForwarder::always_fail(),
            ScriptedForwarder::always_fail(),
        ]);
        let router = router(pool.clone());

        let resp = router.handle(get_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(resp).await, "Service is currently not available");

        // Three attempt rounds, each exhausting the retry budget against a
        // distinct backend before marking it dead.
        assert_eq!(pool.alive_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failover_reaches_a_healthy_backend() {
        // Selection starts at index 1 (the cursor's first base candidate),
        // which always fails; the second attempt lands on a working one.
        let pool = pool_with(vec![
            ScriptedForwarder::always_ok(),
            ScriptedForwarder::always_fail(),
        ]);
        let router = router(pool.clone());

        let resp = router.route(get_request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        assert!(!pool.backends()[1].is_alive().await);
        assert!(pool.backends()[0].is_alive().await);
    }

    #[tokio::test]
    async fn exhausted_pool_is_terminal_503() {
        let pool = pool_with(vec![ScriptedForwarder::always_ok()]);
        pool.backends()[0].set_alive(false).await;
        let router = router(pool);

        let resp = router.handle(get_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(resp).await, "Service not available");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_per_attempt() {
        // First backend selected burns its full retry budget; the fresh
        // attempt gives the next backend a fresh budget, and it succeeds
        // after two transient failures of its own.
        let pool = pool_with(vec![
            ScriptedForwarder::fail_first(2),
            ScriptedForwarder::always_fail(),
        ]);
        let router = router(pool.clone());

        let resp = router.route(get_request()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!pool.backends()[1].is_alive().await);
        assert!(pool.backends()[0].is_alive().await);
    }

    #[test]
    fn attempt_state_transitions() {
        let state = AttemptState::new();
        assert_eq!(state.attempts, 1);
        assert_eq!(state.retries, 0);

        let retried = state.next_retry().next_retry();
        assert_eq!(retried.attempts, 1);
        assert_eq!(retried.retries, 2);

        let escalated = retried.next_attempt();
        assert_eq!(escalated.attempts, 2);
        assert_eq!(escalated.retries, 0);
    }
}
