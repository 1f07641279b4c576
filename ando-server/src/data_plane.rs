//! The data-plane listener: `/_chp_healthz` fast-path, then HTTP/WebSocket
//! forwarding to the longest-prefix-matched route.

use ando_proxy::error_pipeline::{self, ErrorPipelineOptions};
use ando_proxy::forward::ws::{connect_and_relay, WsOutcome};
use ando_proxy::forward::HttpForwarder;
use ando_proxy::ProxyCore;
use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use http::{HeaderMap, StatusCode};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

pub struct DataPlaneState {
    pub core: Arc<ProxyCore>,
    pub forwarder: HttpForwarder,
    pub error_pipeline: ErrorPipelineOptions,
    pub timeout: Option<f64>,
    pub proxy_timeout: Option<f64>,
}

pub fn build_router(state: Arc<DataPlaneState>) -> Router {
    Router::new()
        .route("/_chp_healthz", get(healthz))
        .fallback(handle)
        .with_state(state)
}

async fn healthz() -> Response {
    Json(json!({"status": "OK"})).into_response()
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

fn decoded_path(raw_path: &str) -> String {
    percent_encoding::percent_decode_str(raw_path)
        .decode_utf8_lossy()
        .into_owned()
}

async fn handle(
    State(state): State<Arc<DataPlaneState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let (mut parts, body) = req.into_parts();
    let raw_path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);
    let host_header = parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let matched_prefix = state
        .core
        .resolve(&raw_path, query.as_deref(), host_header.as_deref())
        .await
        .ok()
        .flatten()
        .map(|r| r.prefix);

    let response = if is_websocket_upgrade(&parts.headers) {
        match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(ws) => {
                forward_websocket(
                    &state,
                    ws,
                    &raw_path,
                    query.as_deref(),
                    parts.headers.clone(),
                    host_header.as_deref(),
                    Some(peer.ip()),
                )
                .await
            }
            Err(rejection) => rejection.into_response(),
        }
    } else {
        let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(b) => b,
            Err(_) => {
                return error_pipeline::render(&state.error_pipeline, StatusCode::BAD_REQUEST, &raw_path)
                    .await
            }
        };

        match state
            .forwarder
            .forward(
                &state.core,
                method.clone(),
                parts.headers.clone(),
                body_bytes,
                &raw_path,
                query.as_deref(),
                host_header.as_deref(),
                Some(peer.ip()),
                state.timeout,
                state.proxy_timeout,
            )
            .await
        {
            Ok(resp) => resp.map(Body::new),
            Err(e) => {
                tracing::error!(error = %e, path = %raw_path, "forwarding failed");
                let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                error_pipeline::render(&state.error_pipeline, status, &decoded_path(&raw_path)).await
            }
        }
    };

    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    ando_observability::log_request(
        method.as_str(),
        &raw_path,
        response.status().as_u16(),
        latency_ms,
        matched_prefix.as_deref(),
    );
    response
}

#[allow(clippy::too_many_arguments)]
async fn forward_websocket(
    state: &DataPlaneState,
    ws: WebSocketUpgrade,
    raw_path: &str,
    query: Option<&str>,
    headers: HeaderMap,
    host_header: Option<&str>,
    peer_ip: Option<std::net::IpAddr>,
) -> Response {
    match connect_and_relay(
        Arc::clone(&state.core),
        ws,
        raw_path,
        query,
        headers,
        host_header,
        peer_ip,
        state.timeout,
    )
    .await
    {
        Ok(WsOutcome::Upgraded(resp)) => resp,
        Ok(WsOutcome::Rejected(resp)) => resp,
        Err(e) => {
            tracing::error!(error = %e, path = %raw_path, "websocket relay failed");
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_pipeline::render(&state.error_pipeline, status, &decoded_path(raw_path)).await
        }
    }
}
