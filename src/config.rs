use std::time::Duration;

use crate::proxy::ProxyAddr;
use crate::types::ProbeMode;

pub const DEFAULT_CONCURRENCY: usize = 100;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Settings fixed for the duration of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub mode: ProbeMode,
    /// Run-wide port override; targets with an embedded port keep theirs.
    pub port: Option<u16>,
    pub proxy: Option<ProxyAddr>,
    pub concurrency: usize,
    /// Per-probe timeout, covering connect, tunnel setup and handshake.
    pub timeout: Duration,
}

impl ScanConfig {
    /// Port applied to targets that do not carry their own.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.mode.default_port())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ProbeMode::Plain,
            port: None,
            proxy: None,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ScanConfig::default();
        assert_eq!(c.concurrency, 100);
        assert_eq!(c.timeout, Duration::from_millis(5000));
        assert_eq!(c.effective_port(), 80);
    }

    #[test]
    fn override_beats_mode_default() {
        let c = ScanConfig {
            mode: ProbeMode::Tls,
            ..ScanConfig::default()
        };
        assert_eq!(c.effective_port(), 443);
        let c = ScanConfig {
            port: Some(8443),
            ..c
        };
        assert_eq!(c.effective_port(), 8443);
    }
}
