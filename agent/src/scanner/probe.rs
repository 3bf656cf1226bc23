//! Reachability and port probe primitives.
//!
//! Both probes are best-effort black boxes: they answer "did anything
//! respond" and never surface transport errors to the sweep.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::trace;

use crate::protocol::PortState;

/// Probe seam for the scanner. Production uses [`SystemProber`]; tests
/// substitute a double with a configured topology.
#[async_trait]
pub trait Prober: Send + Sync {
    /// One-shot reachability check for `host`.
    async fn ping(&self, host: Ipv4Addr) -> bool;

    /// Probe a single TCP port on `host`.
    async fn probe_port(&self, host: Ipv4Addr, port: u16) -> PortState;
}

/// Probes via the platform `ping` binary and plain TCP connects.
#[derive(Debug, Clone)]
pub struct SystemProber {
    pub ping_timeout: Duration,
    pub port_timeout: Duration,
}

impl Default for SystemProber {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(1),
            port_timeout: Duration::from_millis(500),
        }
    }
}

impl SystemProber {
    /// Platform-specific one-packet ping invocation. Windows takes the
    /// reply wait in milliseconds (`-w`), POSIX in seconds (`-W`).
    fn ping_args(&self) -> Vec<String> {
        #[cfg(windows)]
        {
            vec![
                "-n".to_string(),
                "1".to_string(),
                "-w".to_string(),
                self.ping_timeout.as_millis().max(1).to_string(),
            ]
        }

        #[cfg(not(windows))]
        {
            vec![
                "-c".to_string(),
                "1".to_string(),
                "-W".to_string(),
                self.ping_timeout.as_secs().max(1).to_string(),
            ]
        }
    }
}

#[async_trait]
impl Prober for SystemProber {
    async fn ping(&self, host: Ipv4Addr) -> bool {
        let status = Command::new("ping")
            .args(self.ping_args())
            .arg(host.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        // The -W/-w flag already bounds the probe; the outer timeout only
        // guards against a ping binary that ignores it.
        let guard = self.ping_timeout * 2 + Duration::from_secs(1);
        match tokio::time::timeout(guard, status).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                trace!("Ping spawn failed for {}: {}", host, e);
                false
            }
            Err(_) => false,
        }
    }

    async fn probe_port(&self, host: Ipv4Addr, port: u16) -> PortState {
        let addr = SocketAddr::new(IpAddr::V4(host), port);
        match tokio::time::timeout(self.port_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => PortState::Open,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => PortState::Closed,
            Ok(Err(_)) | Err(_) => PortState::Filtered,
        }
    }
}
