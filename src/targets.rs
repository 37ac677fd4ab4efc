use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::types::Target;

/// Parse target list content into raw target strings, preserving order.
///
/// Supported per line:
/// - a host, `host:port`, `[v6]:port`, or a URL (`https://host:8443/path`)
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
///
/// No deduplication is performed.
pub fn parse_targets_str(s: &str) -> Vec<String> {
    s.lines()
        .map(|raw| raw.split('#').next().map(str::trim).unwrap_or(""))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load raw target strings from a newline-delimited file.
pub fn load_targets_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("unable to read list file: {}", path.as_ref().display()))?;
    Ok(parse_targets_str(&content))
}

/// Combine positional targets with an optional list file (positional first).
///
/// Positional arguments are kept even when blank; they resolve to an empty
/// host and end up as per-target failures. Errors when the list file is
/// unreadable or nothing remains to probe.
pub fn collect_targets(positional: &[String], list: Option<&Path>) -> Result<Vec<String>> {
    let mut out: Vec<String> = positional.iter().map(|t| t.trim().to_string()).collect();
    if let Some(path) = list {
        out.extend(load_targets_from_path(path)?);
    }
    if out.is_empty() {
        bail!("no targets supplied, see --help");
    }
    Ok(out)
}

/// Resolve one raw target string into a [`Target`].
///
/// A port embedded in the string wins over `default_port`. Scheme, userinfo
/// and path are stripped. Malformed input is kept as the host so the probe
/// reports it as a per-target failure instead of aborting the run.
pub fn parse_target(raw: &str, default_port: u16) -> Target {
    let mut s = raw.trim();
    if let Some((_, rest)) = s.split_once("://") {
        s = rest;
    }
    let s = s.split(['/', '?', '#']).next().unwrap_or("");
    let s = s.rsplit_once('@').map(|(_, h)| h).unwrap_or(s);

    if let Some(rest) = s.strip_prefix('[') {
        if let Some((host, after)) = rest.split_once(']') {
            if after.is_empty() {
                return Target::new(host, default_port);
            }
            if let Some(port) = after.strip_prefix(':').and_then(parse_port_str) {
                return Target::new(host, port);
            }
        }
        return Target::new(s, default_port);
    }

    match s.rsplit_once(':') {
        // More than one colon without brackets is a bare IPv6 literal.
        Some((host, port)) if !host.contains(':') => match parse_port_str(port) {
            Some(port) => Target::new(host, port),
            None => Target::new(s, default_port),
        },
        _ => Target::new(s, default_port),
    }
}

/// Resolve every raw target with the run's default port.
pub fn resolve_targets(raw: &[String], default_port: u16) -> Vec<Target> {
    raw.iter().map(|r| parse_target(r, default_port)).collect()
}

fn parse_port_str(s: &str) -> Option<u16> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(p) => Some(p),
    }
}
