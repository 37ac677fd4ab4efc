use tokio_tungstenite::client_async;
use tracing::debug;

use super::ProbeError;
use crate::proxy::{self, ProxyAddr};
use crate::types::{ProbeDetails, Target};

/// Perform a WebSocket client handshake against `ws://host:port/`.
///
/// Success means the server answered `101` with a valid accept key. The
/// socket is dropped immediately afterwards without a close frame.
pub(super) async fn probe(
    target: &Target,
    proxy: Option<&ProxyAddr>,
) -> Result<ProbeDetails, ProbeError> {
    let stream = proxy::open_stream(target, proxy).await?;
    let url = format!("ws://{target}/");
    let (ws, response) = client_async(url.as_str(), stream)
        .await
        .map_err(|e| ProbeError::Handshake(e.to_string()))?;
    debug!(%target, status = response.status().as_u16(), "upgrade complete");
    drop(ws);
    Ok(ProbeDetails::default())
}
