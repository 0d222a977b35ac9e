// src/health/probe.rs
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

/// Bounded-time reachability check against one backend address.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &Url, timeout: Duration) -> bool;
}

/// Connect-style probe: a TCP dial within the timeout counts as alive.
pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, target: &Url, timeout: Duration) -> bool {
        let host = match target.host_str() {
            Some(host) => host,
            None => return false,
        };
        let port = match target.port_or_known_default() {
            Some(port) => port,
            None => return false,
        };

        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(%target, %err, "site unreachable");
                false
            }
            Err(_) => {
                debug!(%target, "probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_socket_probes_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url: Url = format!("http://127.0.0.1:{}", port).parse().unwrap();

        assert!(TcpProbe.probe(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn closed_port_probes_dead() {
        // Bind then drop to get a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url: Url = format!("http://127.0.0.1:{}", port).parse().unwrap();
        assert!(!TcpProbe.probe(&url, Duration::from_secs(2)).await);
    }
}
