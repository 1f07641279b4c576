//! Bidirectional WebSocket relay.
//!
//! Built on `tokio-tungstenite` for the upstream leg and `axum::extract::ws`
//! for the downstream leg — the workspace already depends on `axum` for the
//! admin API, so this keeps one web-framework choice rather than
//! introducing a second. Connection ordering is the one hard invariant
//! here: the upstream socket must be open *before* the downstream upgrade
//! is ever accepted, so an upstream-side failure can still be reported as
//! an ordinary HTTP response rather than a broken WebSocket handshake.

use crate::core::{apply_header_policy, ProxyCore};
use ando_core::error::AndoError;
use ando_core::store::RouteStore;
use axum::extract::ws::{Message as DownMessage, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use http::HeaderMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as UpMessage;

/// What happened when we tried to bring up the WebSocket relay.
pub enum WsOutcome {
    /// The upstream connected; `response` is axum's 101 Switching
    /// Protocols reply and the relay task is already spawned behind it.
    Upgraded(Response),
    /// The upstream rejected the handshake with an HTTP status; mirror it
    /// to the client verbatim. Never goes through the error pipeline —
    /// spec.md is explicit that this is not a transport failure.
    Rejected(Response),
}

/// Resolve, connect upstream, and — only on success — accept the
/// downstream upgrade and spawn the relay loop.
#[allow(clippy::too_many_arguments)]
pub async fn connect_and_relay(
    core: Arc<ProxyCore>,
    ws: WebSocketUpgrade,
    raw_path: &str,
    query: Option<&str>,
    mut request_headers: HeaderMap,
    host_header: Option<&str>,
    peer_ip: Option<IpAddr>,
    connect_timeout: Option<f64>,
) -> Result<WsOutcome, AndoError> {
    let Some(resolved) = core.resolve(raw_path, query, host_header).await? else {
        return Err(AndoError::RouteNotFound(raw_path.to_string()));
    };

    let mut ws_url = resolved.url.clone();
    let scheme = match ws_url.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    ws_url
        .set_scheme(scheme)
        .map_err(|_| AndoError::StoreError(format!("cannot rewrite scheme for {ws_url}")))?;

    apply_header_policy(
        &mut request_headers,
        core.options(),
        peer_ip,
        if scheme == "wss" { "https" } else { "http" },
        host_header,
    )?;

    let mut client_request = ws_url
        .as_str()
        .into_client_request()
        .map_err(|e| AndoError::StoreError(format!("building upstream ws request: {e}")))?;
    for (name, value) in request_headers.iter() {
        client_request.headers_mut().insert(name, value.clone());
    }

    let connect = tokio_tungstenite::connect_async(client_request);
    let connected = match connect_timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs_f64(secs), connect)
            .await
            .map_err(|_| AndoError::StoreError("upstream websocket connect timed out".into()))?,
        None => connect.await,
    };

    let (upstream, _resp) = match connected {
        Ok(pair) => pair,
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            let (parts, body) = resp.into_parts();
            let body_bytes = body.unwrap_or_default();
            let mut response = Response::new(axum::body::Body::from(body_bytes));
            *response.status_mut() = parts.status;
            *response.headers_mut() = parts.headers;
            return Ok(WsOutcome::Rejected(response));
        }
        Err(e) => {
            return Err(AndoError::StoreError(format!(
                "upstream websocket transport failure: {e}"
            )))
        }
    };

    let store = Arc::clone(core.store());
    let prefix = resolved.prefix.clone();
    let response = ws.on_upgrade(move |socket| relay(socket, upstream, store, prefix));
    Ok(WsOutcome::Upgraded(response.into_response()))
}

async fn relay(
    downstream: WebSocket,
    upstream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    store: Arc<dyn RouteStore>,
    prefix: String,
) {
    let (mut d_tx, mut d_rx) = downstream.split();
    let (mut u_tx, mut u_rx) = upstream.split();

    loop {
        tokio::select! {
            down = d_rx.next() => {
                let Some(Ok(msg)) = down else { break };
                let is_close = matches!(msg, DownMessage::Close(_));
                if let Some(up_msg) = to_upstream(msg) {
                    if u_tx.send(up_msg).await.is_err() {
                        break;
                    }
                    let _ = store.touch(&prefix).await;
                }
                if is_close {
                    break;
                }
            }
            up = u_rx.next() => {
                let Some(Ok(msg)) = up else { break };
                let is_close = matches!(msg, UpMessage::Close(_));
                if let Some(down_msg) = to_downstream(msg) {
                    if d_tx.send(down_msg).await.is_err() {
                        break;
                    }
                    let _ = store.touch(&prefix).await;
                }
                if is_close {
                    break;
                }
            }
        }
    }

    let _ = d_tx.close().await;
    let _ = u_tx.close().await;
}

fn to_upstream(msg: DownMessage) -> Option<UpMessage> {
    match msg {
        DownMessage::Text(t) => Some(UpMessage::Text(t.as_str().into())),
        DownMessage::Binary(b) => Some(UpMessage::Binary(b.to_vec().into())),
        DownMessage::Ping(b) => Some(UpMessage::Ping(b.to_vec().into())),
        DownMessage::Pong(b) => Some(UpMessage::Pong(b.to_vec().into())),
        DownMessage::Close(_) => Some(UpMessage::Close(None)),
    }
}

fn to_downstream(msg: UpMessage) -> Option<DownMessage> {
    match msg {
        UpMessage::Text(t) => Some(DownMessage::Text(t.as_str().into())),
        UpMessage::Binary(b) => Some(DownMessage::Binary(b.to_vec().into())),
        UpMessage::Ping(b) => Some(DownMessage::Ping(b.to_vec().into())),
        UpMessage::Pong(b) => Some(DownMessage::Pong(b.to_vec().into())),
        UpMessage::Close(_) => Some(DownMessage::Close(None)),
        UpMessage::Frame(_) => None,
    }
}
