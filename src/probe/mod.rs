//! Probe strategies: one network interaction per target, never failing.
mod plain;
mod tls;
mod upgrade;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{self, Instant};
use tracing::debug;

use crate::config::ScanConfig;
use crate::proxy::ProxyAddr;
use crate::types::{ProbeDetails, ProbeMode, ProbeOutcome, Target};

/// Why a single probe attempt failed. Flattened into [`ProbeOutcome::error`].
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("empty host")]
    EmptyHost,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("proxy refused tunnel with status {0}")]
    Proxy(u16),
    #[error("connection closed before a response was received")]
    Closed,
    #[error("invalid HTTP response: {0}")]
    Http(String),
    #[error("TLS handshake failed: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("upgrade handshake failed: {0}")]
    Handshake(String),
}

/// Contract shared by every probe strategy.
///
/// Implementations must resolve to an outcome for every input, including
/// unroutable hosts and timeouts, so the scheduler never sees a failure.
pub trait Probe: Send + Sync + 'static {
    fn mode(&self) -> ProbeMode;

    fn probe(&self, target: &Target) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Production strategy dispatcher, built once per run and shared by all probe tasks.
pub struct Prober {
    mode: ProbeMode,
    timeout: Duration,
    proxy: Option<ProxyAddr>,
    tls: tokio_native_tls::TlsConnector,
}

impl Prober {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            mode: config.mode,
            timeout: config.timeout,
            proxy: config.proxy.clone(),
            tls: tls::insecure_connector().context("failed to build TLS connector")?,
        })
    }

    async fn attempt(&self, target: &Target) -> Result<ProbeDetails, ProbeError> {
        if target.bare_host().is_empty() {
            return Err(ProbeError::EmptyHost);
        }
        let proxy = self.proxy.as_ref();
        match self.mode {
            ProbeMode::Plain => plain::probe(target, proxy).await,
            ProbeMode::Tls => tls::probe(&self.tls, target, proxy).await,
            ProbeMode::Upgrade => upgrade::probe(target, proxy).await,
        }
    }
}

impl Probe for Prober {
    fn mode(&self) -> ProbeMode {
        self.mode
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let start = Instant::now();
        // Dropping the attempt on expiry closes whatever socket it holds.
        let res = time::timeout(self.timeout, self.attempt(target)).await;
        let elapsed = start.elapsed();
        match res {
            Ok(Ok(details)) => {
                debug!(%target, mode = %self.mode, ?details, "reachable");
                ProbeOutcome::reachable(target, self.mode, details, elapsed)
            }
            Ok(Err(e)) => {
                debug!(%target, mode = %self.mode, error = %e, "unreachable");
                ProbeOutcome::failed(target, self.mode, e.to_string(), elapsed)
            }
            Err(_) => {
                debug!(
                    %target,
                    mode = %self.mode,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "timed out"
                );
                ProbeOutcome::timed_out(target, self.mode, elapsed)
            }
        }
    }
}
