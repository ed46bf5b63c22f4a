//! Network reachability probing
//!
//! Every status cycle starts with a liveness check before any API call is attempted.

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::config::ProbeConfig;

/// Outcome of a completed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub alive: bool,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// Liveness check for a host
#[async_trait]
pub trait Reachability: Send + Sync {
    /// `Ok(None)` means the probe completed without producing a result
    async fn probe(&self, host: &str) -> Result<Option<ProbeResult>, ProbeError>;
}

/// TCP connect probe
///
/// The host counts as alive when a connection to `port` is accepted within the
/// timeout. Refused and timed-out connections report `alive: false`.
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    /// Create from config
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.port, config.timeout())
    }

    async fn resolve(&self, host: &str) -> Result<Option<SocketAddr>, ProbeError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Some(SocketAddr::new(ip, self.port)));
        }

        let mut addrs = tokio::net::lookup_host((host, self.port))
            .await
            .map_err(|source| ProbeError::Resolve {
                host: host.to_string(),
                source,
            })?;

        Ok(addrs.next())
    }
}

#[async_trait]
impl Reachability for TcpProbe {
    async fn probe(&self, host: &str) -> Result<Option<ProbeResult>, ProbeError> {
        let Some(addr) = self.resolve(host.trim()).await? else {
            debug!(host, "Probe address resolved to nothing");
            return Ok(None);
        };

        let alive = match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                trace!(%addr, error = %e, "Probe connection failed");
                false
            }
            Err(_) => {
                trace!(%addr, timeout_ms = self.timeout.as_millis() as u64, "Probe timed out");
                false
            }
        };

        debug!(%addr, alive, "Probe finished");
        Ok(Some(ProbeResult { alive }))
    }
}
