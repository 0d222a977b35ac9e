// src/proxy/test_support.rs
// Scripted forwarder for exercising the retry/failover protocol without
// real sockets.
use super::forwarder::{ForwardError, Forwarder};
use async_trait::async_trait;
use hyper::{Body, Request, Response};
use std::sync::atomic::{AtomicU32, Ordering};

pub(crate) struct ScriptedForwarder {
    fail_first: u32,
    calls: AtomicU32,
}

impl ScriptedForwarder {
    pub(crate) fn always_ok() -> Self {
        Self::fail_first(0)
    }

    pub(crate) fn always_fail() -> Self {
        Self::fail_first(u32::MAX)
    }

    /// Fails the first `n` forwards, succeeds afterwards.
    pub(crate) fn fail_first(n: u32) -> Self {
        Self {
            fail_first: n,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn transport_error() -> ForwardError {
    // Any constructible http error stands in for a connection failure;
    // the router treats every ForwardError as a transport error.
    let err = Response::builder().status(9999).body(()).unwrap_err();
    ForwardError::InvalidRequest(err)
}

#[async_trait]
impl Forwarder for ScriptedForwarder {
    async fn forward(&self, _req: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(transport_error());
        }
        Ok(Response::new(Body::from("ok")))
    }
}
