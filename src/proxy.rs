use std::fmt;
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::probe::ProbeError;
use crate::types::Target;

/// Upper bound on a response head we are willing to buffer.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Forward proxy descriptor, parsed from `host:port` (an `http://` prefix is accepted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddr {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProxyAddrError {
    #[error("proxy must be host:port, got {0:?}")]
    MissingPort(String),
    #[error("proxy host is empty")]
    EmptyHost,
    #[error("invalid proxy port: {0:?}")]
    InvalidPort(String),
    #[error("unsupported proxy scheme {0:?} (only http CONNECT proxies are supported)")]
    UnsupportedScheme(String),
}

impl FromStr for ProxyAddr {
    type Err = ProxyAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s.trim();
        if let Some((scheme, after)) = rest.split_once("://") {
            if !scheme.eq_ignore_ascii_case("http") {
                return Err(ProxyAddrError::UnsupportedScheme(scheme.to_string()));
            }
            rest = after;
        }
        let rest = rest.trim_end_matches('/');
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| ProxyAddrError::MissingPort(s.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ProxyAddrError::EmptyHost);
        }
        let port = match port.parse::<u16>() {
            Ok(p) if p != 0 => p,
            _ => return Err(ProxyAddrError::InvalidPort(port.to_string())),
        };
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ProxyAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Target::new(self.host.clone(), self.port))
    }
}

/// Open a TCP stream to `target`, directly or through an HTTP CONNECT tunnel.
///
/// The returned stream is positioned at the start of the tunnelled byte stream.
pub async fn open_stream(
    target: &Target,
    proxy: Option<&ProxyAddr>,
) -> Result<TcpStream, ProbeError> {
    let Some(proxy) = proxy else {
        debug!(%target, "connecting directly");
        return Ok(TcpStream::connect((target.bare_host(), target.port)).await?);
    };

    debug!(%target, %proxy, "connecting through proxy");
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;
    let authority = target.to_string();
    let request = format!(
        "CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\
         Proxy-Connection: keep-alive\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await?;

    let head = read_until(&mut stream, b"\r\n\r\n").await?;
    match parse_status_line(&head) {
        Some(code) if (200..300).contains(&code) => {
            // Every mode speaks first, so nothing may follow the reply head.
            if trailing_len(&head, b"\r\n\r\n") > 0 {
                return Err(ProbeError::Http("proxy sent data before the tunnel opened".into()));
            }
            Ok(stream)
        }
        Some(code) => Err(ProbeError::Proxy(code)),
        None => Err(ProbeError::Http("malformed proxy response".into())),
    }
}

/// Read from `stream` until `delim` has been seen, returning everything read so far.
///
/// Reads happen in chunks, so the buffer may run past `delim`. Those extra
/// bytes belong to the peer's next message and are not pushed back into the
/// stream; callers that keep using the stream must check [`trailing_len`].
/// A peer that closes early yields whatever arrived if it already holds a
/// complete first line, otherwise [`ProbeError::Closed`].
pub(crate) async fn read_until<S>(
    stream: &mut S,
    delim: &[u8],
) -> Result<Vec<u8>, ProbeError>
where
    S: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(512);
    let mut buf = [0u8; 512];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            if contains(&head, b"\r\n") {
                return Ok(head);
            }
            return Err(ProbeError::Closed);
        }
        head.extend_from_slice(&buf[..n]);
        if contains(&head, delim) {
            return Ok(head);
        }
        if head.len() > MAX_HEAD_BYTES {
            return Err(ProbeError::Http("response head too large".into()));
        }
    }
}

/// Extract the status code from an HTTP/1.x status line.
pub(crate) fn parse_status_line(head: &[u8]) -> Option<u16> {
    let line_end = head.windows(2).position(|w| w == b"\r\n").unwrap_or(head.len());
    let line = std::str::from_utf8(&head[..line_end]).ok()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let code: u16 = parts.next()?.parse().ok()?;
    (100..1000).contains(&code).then_some(code)
}

/// Number of bytes in `head` after the first `delim`, zero when it is absent.
pub(crate) fn trailing_len(head: &[u8], delim: &[u8]) -> usize {
    head.windows(delim.len())
        .position(|w| w == delim)
        .map_or(0, |at| head.len() - at - delim.len())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_proxy_forms() {
        let p: ProxyAddr = "127.0.0.1:8080".parse().unwrap();
        assert_eq!(p, ProxyAddr { host: "127.0.0.1".into(), port: 8080 });
        let p: ProxyAddr = "http://proxy.test:3128/".parse().unwrap();
        assert_eq!(p, ProxyAddr { host: "proxy.test".into(), port: 3128 });
        let p: ProxyAddr = "[::1]:3128".parse().unwrap();
        assert_eq!(p.host, "::1");
    }

    #[test]
    fn reject_bad_proxies() {
        assert_eq!(
            "proxy.test".parse::<ProxyAddr>(),
            Err(ProxyAddrError::MissingPort("proxy.test".into()))
        );
        assert_eq!(":8080".parse::<ProxyAddr>(), Err(ProxyAddrError::EmptyHost));
        assert!(matches!(
            "p.test:0".parse::<ProxyAddr>(),
            Err(ProxyAddrError::InvalidPort(_))
        ));
        assert!(matches!(
            "socks5://p.test:1080".parse::<ProxyAddr>(),
            Err(ProxyAddrError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn status_lines() {
        let established = b"HTTP/1.1 200 Connection established\r\n\r\n";
        assert_eq!(parse_status_line(established), Some(200));
        assert_eq!(parse_status_line(b"HTTP/1.0 404 Not Found\r\n"), Some(404));
        assert_eq!(parse_status_line(b"SSH-2.0-OpenSSH_9.6\r\n"), None);
        assert_eq!(parse_status_line(b"HTTP/1.1 abc\r\n"), None);
    }

    #[tokio::test]
    async fn read_until_stops_at_delimiter() {
        let mut input: &[u8] = b"HTTP/1.1 200 OK\r\nX: y\r\n\r\nbody";
        let head = read_until(&mut input, b"\r\n\r\n").await.unwrap();
        assert!(head.starts_with(b"HTTP/1.1 200 OK"));
        assert_eq!(trailing_len(&head, b"\r\n\r\n"), 4);
    }

    #[test]
    fn trailing_bytes_after_head() {
        assert_eq!(trailing_len(b"HTTP/1.1 200 OK\r\n\r\n", b"\r\n\r\n"), 0);
        assert_eq!(trailing_len(b"HTTP/1.1 200 OK\r\n\r\nSSH-2.0", b"\r\n\r\n"), 7);
        assert_eq!(trailing_len(b"HTTP/1.1 200 OK\r\n", b"\r\n\r\n"), 0);
    }

    #[tokio::test]
    async fn read_until_reports_early_close() {
        let mut input: &[u8] = b"";
        let res = read_until(&mut input, b"\r\n").await;
        assert!(matches!(res, Err(ProbeError::Closed)));
    }
}
