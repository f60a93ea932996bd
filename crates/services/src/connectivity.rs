//! Network availability checks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::GatewayConfig;

/// Reports whether any network transport is currently usable.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probe with a switchable answer.
#[derive(Debug)]
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Considers the network usable when a TCP connection to the service opens in time.
#[derive(Debug, Clone)]
pub struct TcpConnectivityProbe {
    addr: String,
    timeout: Duration,
}

impl TcpConnectivityProbe {
    #[must_use]
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Probe the configured stats service host.
    #[must_use]
    pub fn for_gateway(config: &GatewayConfig) -> Option<Self> {
        let addr = config.socket_addr()?;
        Some(Self::new(addr, config.timeout().min(Duration::from_secs(3))))
    }
}

#[async_trait]
impl ConnectivityProbe for TcpConnectivityProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(addr = %self.addr, error = %err, "connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, "connectivity probe timed out");
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
    async fn static_probe_switches() {
        let probe = StaticProbe::new(false);
        assert!(!probe.is_online().await);
        probe.set_online(true);
        assert!(probe.is_online().await);
    }

    #[tokio::test]
    async fn tcp_probe_sees_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let probe = TcpConnectivityProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(probe.is_online().await);

        drop(listener);
        assert!(!probe.is_online().await);
    }

    #[test]
    fn gateway_probe_targets_service_host() {
        let config = GatewayConfig::new("http://stats.local:8080/v1").unwrap();
        let probe = TcpConnectivityProbe::for_gateway(&config).unwrap();
        assert_eq!(probe.addr, "stats.local:8080");
    }
}
