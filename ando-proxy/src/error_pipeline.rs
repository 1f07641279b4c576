//! The three-mode error pipeline (spec §4.G): a custom `error_target`
//! subrequest, then a static `error_path/<code>.html` page, then a minimal
//! built-in page — each mode falling through to the next on failure.
//!
//! WebSocket call sites never reach this module once the upgrade has
//! started; see `forward::ws::WsOutcome`.

use crate::core::HOP_BY_HOP_RESPONSE_HEADERS;
use ando_core::config::GatewayConfig;
use axum::body::Body;
use axum::response::Response;
use http::StatusCode;
use std::path::PathBuf;
use std::time::Duration;

/// Fixed per spec.md §4.G mode 1 — there is no config knob for it.
const ERROR_TARGET_TIMEOUT: Duration = Duration::from_secs(10);

/// The subset of `GatewayConfig` the error pipeline consults. Config
/// validation (mutual exclusion) happens once at startup in
/// `GatewayConfig::validate`; this type just carries the resolved choice.
#[derive(Debug, Clone, Default)]
pub struct ErrorPipelineOptions {
    pub error_target: Option<String>,
    pub error_path: Option<PathBuf>,
}

impl ErrorPipelineOptions {
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self {
            error_target: cfg.error_target.clone(),
            error_path: cfg.error_path.clone(),
        }
    }
}

/// Render the error response for `status` encountered while serving
/// `request_path`, trying each configured mode in order.
pub async fn render(options: &ErrorPipelineOptions, status: StatusCode, request_path: &str) -> Response {
    if let Some(base) = &options.error_target {
        if let Some(resp) = try_error_target(base, status, request_path).await {
            return resp;
        }
    } else if let Some(dir) = &options.error_path {
        if let Some(resp) = try_static_page(dir, status).await {
            return resp;
        }
    }
    default_page(status)
}

/// Mode 1: `GET <error_target>/<code>?url=<escaped-request-path>`.
async fn try_error_target(base: &str, status: StatusCode, request_path: &str) -> Option<Response> {
    let escaped = percent_encoding::utf8_percent_encode(
        request_path,
        percent_encoding::NON_ALPHANUMERIC,
    )
    .to_string();
    let url = format!(
        "{}/{}?url={}",
        base.trim_end_matches('/'),
        status.as_u16(),
        escaped
    );

    let client = reqwest::Client::new();
    let upstream = client.get(&url).timeout(ERROR_TARGET_TIMEOUT).send().await.ok()?;
    if !upstream.status().is_success() {
        // A non-2xx error-target reply is itself a failure, not a page to
        // mirror — fall through to the static path / default page.
        return None;
    }
    let resp_status = StatusCode::from_u16(upstream.status().as_u16()).ok()?;

    let mut builder = Response::builder().status(resp_status);
    for (name, value) in upstream.headers().iter() {
        if HOP_BY_HOP_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    let body = upstream.bytes().await.ok()?;
    builder.body(Body::from(body)).ok()
}

/// Mode 2: `<error_path>/<code>.html`, falling back to `<error_path>/error.html`.
async fn try_static_page(dir: &PathBuf, status: StatusCode) -> Option<Response> {
    let candidates = [
        dir.join(format!("{}.html", status.as_u16())),
        dir.join("error.html"),
    ];
    for path in candidates {
        if let Ok(contents) = tokio::fs::read(&path).await {
            return Response::builder()
                .status(status)
                .header(http::header::CONTENT_TYPE, "text/html")
                .body(Body::from(contents))
                .ok();
        }
    }
    None
}

/// Mode 3: a minimal built-in page, titled `"<code>: <reason>"`.
fn default_page(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    let title = format!("{}: {reason}", status.as_u16());
    let body = format!(
        "<!DOCTYPE html><html><head><title>{title}</title></head>\
         <body><h1>{title}</h1></body></html>"
    );
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "text/html")
        .body(Body::from(body))
        .expect("default error page is always well-formed")
}
