// src/server/handler.rs
use hyper::{Body, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use crate::proxy::Router;

/// Tower service adapter over the Router. Routing never fails the
/// connection: protocol errors are already mapped to 503 responses.
#[derive(Clone)]
pub struct RequestHandler {
    router: Arc<Router>,
}

impl RequestHandler {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let router = self.router.clone();
        Box::pin(async move { Ok(router.handle(req).await) })
    }
}
