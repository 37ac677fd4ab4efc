use std::fmt;
use std::net::Ipv6Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use ::time::{format_description::well_known, OffsetDateTime};

/// Which probe strategy a run uses. Exactly one mode is active per run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Plain HTTP request for `/`.
    #[default]
    Plain,
    /// TLS handshake with certificate metadata extraction.
    Tls,
    /// WebSocket upgrade handshake.
    Upgrade,
}

impl ProbeMode {
    /// Port used when neither the target nor the run overrides it.
    pub fn default_port(self) -> u16 {
        match self {
            ProbeMode::Tls => 443,
            ProbeMode::Plain | ProbeMode::Upgrade => 80,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProbeMode::Plain => "plain",
            ProbeMode::Tls => "tls",
            ProbeMode::Upgrade => "upgrade",
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One endpoint to probe. The port is already resolved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host in a form usable inside `host:port` authorities.
    ///
    /// Only real IPv6 literals get brackets; malformed hosts are shown as given.
    pub fn host_for_authority(&self) -> String {
        if self.bare_host().parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", self.bare_host())
        } else {
            self.host.clone()
        }
    }

    /// Host with any IPv6 brackets removed, for socket connects and TLS SNI.
    pub fn bare_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_for_authority(), self.port)
    }
}

/// Mode-specific metadata gathered by a successful probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeDetails {
    /// HTTP status code (plain mode).
    pub status: Option<u16>,
    /// Issuer organization of the peer certificate (TLS mode).
    pub issuer: Option<String>,
    /// `notAfter` of the peer certificate, RFC 3339 (TLS mode).
    pub expires: Option<String>,
}

/// The three mutually exclusive ways a probe can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Reachable,
    TimedOut,
    Failed,
}

/// Result of one completed probe attempt.
///
/// Built only through [`ProbeOutcome::reachable`], [`ProbeOutcome::timed_out`]
/// and [`ProbeOutcome::failed`], so `reachable` and `timed_out` are never both set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub host: String,
    pub port: u16,
    pub mode: ProbeMode,
    pub reachable: bool,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub timestamp: String,
}

impl ProbeOutcome {
    pub fn reachable(
        target: &Target,
        mode: ProbeMode,
        details: ProbeDetails,
        elapsed: Duration,
    ) -> Self {
        Self {
            status: details.status,
            issuer: details.issuer,
            expires: details.expires,
            ..Self::base(target, mode, true, false, None, elapsed)
        }
    }

    pub fn timed_out(target: &Target, mode: ProbeMode, elapsed: Duration) -> Self {
        let error = Some("timed out".to_string());
        Self::base(target, mode, false, true, error, elapsed)
    }

    pub fn failed(
        target: &Target,
        mode: ProbeMode,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self::base(target, mode, false, false, Some(error.into()), elapsed)
    }

    fn base(
        target: &Target,
        mode: ProbeMode,
        reachable: bool,
        timed_out: bool,
        error: Option<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
            mode,
            reachable,
            timed_out,
            status: None,
            issuer: None,
            expires: None,
            error,
            elapsed_ms: elapsed.as_millis() as u64,
            timestamp: now_rfc3339(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        if self.reachable {
            OutcomeKind::Reachable
        } else if self.timed_out {
            OutcomeKind::TimedOut
        } else {
            OutcomeKind::Failed
        }
    }

    /// `host:port` label, matching [`Target`]'s display form.
    pub fn endpoint(&self) -> String {
        Target::new(self.host.clone(), self.port).to_string()
    }
}

/// Aggregate of one run: counters plus outcomes in completion order.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanResults {
    pub scanned_total: u64,
    pub scanned_done: u64,
    pub reachable_count: u64,
    pub timed_out_count: u64,
    pub outcomes: Vec<ProbeOutcome>,
}

impl ScanResults {
    pub(crate) fn with_capacity(total: usize) -> Self {
        Self {
            scanned_total: total as u64,
            outcomes: Vec::with_capacity(total),
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, outcome: ProbeOutcome) {
        self.scanned_done += 1;
        match outcome.kind() {
            OutcomeKind::Reachable => self.reachable_count += 1,
            OutcomeKind::TimedOut => self.timed_out_count += 1,
            OutcomeKind::Failed => {}
        }
        self.outcomes.push(outcome);
    }
}

/// Format an x509/`time` timestamp or the current time as RFC 3339.
pub(crate) fn format_rfc3339(t: OffsetDateTime) -> String {
    t.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_follow_mode() {
        assert_eq!(ProbeMode::Plain.default_port(), 80);
        assert_eq!(ProbeMode::Upgrade.default_port(), 80);
        assert_eq!(ProbeMode::Tls.default_port(), 443);
    }

    #[test]
    fn outcome_constructors_keep_states_exclusive() {
        let t = Target::new("a.test", 80);
        let details = ProbeDetails::default();
        let ok = ProbeOutcome::reachable(&t, ProbeMode::Plain, details, Duration::ZERO);
        let to = ProbeOutcome::timed_out(&t, ProbeMode::Plain, Duration::from_millis(100));
        let bad = ProbeOutcome::failed(&t, ProbeMode::Plain, "refused", Duration::ZERO);

        assert_eq!(ok.kind(), OutcomeKind::Reachable);
        assert!(ok.error.is_none());
        assert_eq!(to.kind(), OutcomeKind::TimedOut);
        assert!(!to.reachable);
        assert_eq!(bad.kind(), OutcomeKind::Failed);
        assert!(!bad.reachable && !bad.timed_out);
        assert_eq!(to.elapsed_ms, 100);
    }

    #[test]
    fn ipv6_targets_are_bracketed() {
        let t = Target::new("::1", 8080);
        assert_eq!(t.to_string(), "[::1]:8080");
        assert_eq!(t.bare_host(), "::1");
        assert_eq!(Target::new("[::1]", 443).to_string(), "[::1]:443");
    }

    #[test]
    fn malformed_hosts_are_not_bracketed() {
        assert_eq!(Target::new("a.test:http", 80).to_string(), "a.test:http:80");
        assert_eq!(Target::new("a.test", 80).to_string(), "a.test:80");
    }

    #[test]
    fn mode_serializes_lowercase() {
        let json = serde_json::to_string(&ProbeMode::Upgrade).unwrap();
        assert_eq!(json, "\"upgrade\"");
    }
}
