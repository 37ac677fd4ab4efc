use tokio::io::AsyncWriteExt;
use tokio_native_tls::TlsConnector;
use tracing::debug;
use x509_parser::prelude::*;

use super::ProbeError;
use crate::proxy::{self, ProxyAddr};
use crate::types::{format_rfc3339, ProbeDetails, Target};

/// Connector that completes handshakes with self-signed, expired or mismatched certificates.
pub(super) fn insecure_connector() -> Result<TlsConnector, native_tls::Error> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    Ok(TlsConnector::from(connector))
}

/// Complete a TLS handshake and report the peer certificate's issuer and expiry.
pub(super) async fn probe(
    connector: &TlsConnector,
    target: &Target,
    proxy: Option<&ProxyAddr>,
) -> Result<ProbeDetails, ProbeError> {
    let stream = proxy::open_stream(target, proxy).await?;
    let mut tls = connector.connect(target.bare_host(), stream).await?;
    debug!(%target, "TLS handshake complete");

    let details = match tls.get_ref().peer_certificate() {
        Ok(Some(cert)) => match cert.to_der() {
            Ok(der) => certificate_details(&der),
            Err(e) => {
                debug!(%target, error = %e, "could not encode peer certificate");
                ProbeDetails::default()
            }
        },
        Ok(None) => {
            debug!(%target, "no peer certificate presented");
            ProbeDetails::default()
        }
        Err(e) => {
            debug!(%target, error = %e, "could not read peer certificate");
            ProbeDetails::default()
        }
    };

    // Best effort close_notify; the handshake already succeeded.
    let _ = tls.shutdown().await;
    Ok(details)
}

/// Pull issuer organization and `notAfter` out of a DER certificate.
///
/// Unparseable certificates yield empty details; the handshake result stands.
pub(crate) fn certificate_details(der: &[u8]) -> ProbeDetails {
    let Ok((_, x509)) = parse_x509_certificate(der) else {
        return ProbeDetails::default();
    };
    let issuer = x509
        .issuer()
        .iter_organization()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string);
    let expires = format_rfc3339(x509.validity().not_after.to_datetime());
    ProbeDetails {
        status: None,
        issuer,
        expires: Some(expires),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_certificate_yields_no_details() {
        assert_eq!(certificate_details(b"not a certificate"), ProbeDetails::default());
    }

    #[test]
    fn connector_builds() {
        assert!(insecure_connector().is_ok());
    }
}
