// src/proxy/forwarder.rs
// Forwards a single request to one upstream target, reverse-proxy style.
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::{HeaderValue, HOST};
use hyper::{Body, Client, Request, Response, Uri};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("transport error: {0}")]
    Transport(#[from] hyper::Error),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),
}

/// Capability that forwards one request to a fixed upstream and yields the
/// upstream's response or a transport error. Fixed per backend for its
/// lifetime.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ForwardError>;
}

pub struct HttpForwarder {
    client: Client<HttpConnector>,
    scheme: String,
    authority: String,
}

impl HttpForwarder {
    pub fn new(target: &Url) -> Self {
        let authority = match (target.host_str(), target.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        Self {
            client: Client::new(),
            scheme: target.scheme().to_string(),
            authority,
        }
    }

    fn rewrite_uri(&self, uri: &Uri) -> Result<Uri, hyper::http::Error> {
        let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

        Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.authority.as_str())
            .path_and_query(path_and_query)
            .build()
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, mut req: Request<Body>) -> Result<Response<Body>, ForwardError> {
        *req.uri_mut() = self.rewrite_uri(req.uri())?;

        // Host header is rewritten to the target; everything else passes
        // through verbatim, response is streamed back as-is.
        let host = HeaderValue::from_str(&self.authority)
            .map_err(hyper::http::Error::from)?;
        req.headers_mut().insert(HOST, host);

        let resp = self.client.request(req).await?;
        Ok(resp)
    }
}
