//
// src/proxy/mod.rs
//
mod backend;
mod forwarder;
mod pool;
mod router;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::Backend;
pub use forwarder::{ForwardError, Forwarder, HttpForwarder};
pub use pool::BackendPool;
pub use router::{AttemptState, ProxyError, Router};
