use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::ProbeError;
use crate::proxy::{self, ProxyAddr};
use crate::types::{ProbeDetails, Target};

const USER_AGENT: &str = concat!("reachscan/", env!("CARGO_PKG_VERSION"));

/// Request `/` and accept any HTTP status as proof of reachability.
///
/// Only the status line is read; the stream is dropped right after.
pub(super) async fn probe(
    target: &Target,
    proxy: Option<&ProxyAddr>,
) -> Result<ProbeDetails, ProbeError> {
    let mut stream = proxy::open_stream(target, proxy).await?;

    let request = format!(
        "GET / HTTP/1.1\r\nHost: {}\r\nUser-Agent: {USER_AGENT}\r\n\
         Accept: */*\r\nConnection: close\r\n\r\n",
        host_header(target)
    );
    stream.write_all(request.as_bytes()).await?;

    let head = proxy::read_until(&mut stream, b"\r\n").await?;
    let status = proxy::parse_status_line(&head).ok_or_else(|| {
        let line = String::from_utf8_lossy(&head);
        let line = line.lines().next().unwrap_or_default();
        ProbeError::Http(line.chars().take(60).collect())
    })?;
    debug!(%target, status, "HTTP response");

    Ok(ProbeDetails {
        status: Some(status),
        ..ProbeDetails::default()
    })
}

fn host_header(target: &Target) -> String {
    if target.port == 80 {
        target.host_for_authority()
    } else {
        target.to_string()
    }
}
