//! Plain HTTP/1.1 forwarding: build the upstream request, enforce the two
//! timeouts, and reshape the upstream response for relay to the client.
//!
//! Built on `hyper` + `hyper-util`'s legacy client rather than the donor's
//! hand-rolled monoio+httparse connection loop — see DESIGN.md for why.

use crate::core::{apply_header_policy, ProxyCore, HOP_BY_HOP_RESPONSE_HEADERS};
use ando_core::error::AndoError;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::net::IpAddr;
use std::time::Duration;

pub type ForwardBody = Full<Bytes>;

/// A connection-pooling HTTP/1.1 client, one per proxy process.
pub struct HttpForwarder {
    client: Client<HttpConnector, ForwardBody>,
}

impl HttpForwarder {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }

    /// Forward one request. `timeout`/`proxy_timeout` are in seconds,
    /// `None` meaning unbounded, matching `GatewayConfig`'s units.
    #[allow(clippy::too_many_arguments)]
    pub async fn forward(
        &self,
        core: &ProxyCore,
        method: Method,
        mut headers: HeaderMap,
        body: Bytes,
        raw_path: &str,
        query: Option<&str>,
        host_header: Option<&str>,
        peer_ip: Option<IpAddr>,
        timeout: Option<f64>,
        proxy_timeout: Option<f64>,
    ) -> Result<Response<ForwardBody>, AndoError> {
        let total_budget = timeout.map(Duration::from_secs_f64);
        let upstream_budget = proxy_timeout.map(Duration::from_secs_f64);

        let attempt = async move {
            let Some(resolved) = core.resolve(raw_path, query, host_header).await? else {
                return Ok(None);
            };

            let scheme = resolved.url.scheme().to_string();
            apply_header_policy(&mut headers, core.options(), peer_ip, &scheme, host_header)?;

            let req = Request::builder()
                .method(method)
                .uri(resolved.url.as_str())
                .body(Full::new(body))
                .map_err(|e| AndoError::StoreError(format!("building upstream request: {e}")))?;
            let (mut parts, body) = req.into_parts();
            parts.headers = headers;
            let req = Request::from_parts(parts, body);

            let send = self.client.request(req);
            let resp = match upstream_budget {
                Some(d) => tokio::time::timeout(d, send)
                    .await
                    .map_err(|_| AndoError::StoreError("upstream timed out".into()))?,
                None => send.await,
            }
            .map_err(|e| AndoError::StoreError(format!("upstream request failed: {e}")))?;

            let status = resp.status();
            let (parts, incoming_body) = resp.into_parts();
            let collected = incoming_body
                .collect()
                .await
                .map_err(|e| AndoError::StoreError(format!("reading upstream body: {e}")))?
                .to_bytes();

            if status.as_u16() < 300 {
                // Fails silently if the route vanished between resolve() and
                // here, or on a transient store error — a touch failure must
                // never turn an already-successful upstream response into an
                // error page.
                if let Err(e) = core.store().touch(&resolved.prefix).await {
                    tracing::warn!(error = %e, prefix = %resolved.prefix, "touch failed after forwarding");
                }
            }

            Ok(Some(shape_response(status, parts.headers, collected)))
        };

        let result = match total_budget {
            Some(d) => tokio::time::timeout(d, attempt)
                .await
                .map_err(|_| AndoError::StoreError("forwarder total timeout exceeded".into()))?,
            None => attempt.await,
        }?;

        match result {
            Some(resp) => Ok(resp),
            None => Err(AndoError::RouteNotFound(raw_path.to_string())),
        }
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip hop-by-hop headers, preserve multi-valued headers (`Set-Cookie`)
/// as repeated entries, and recompute `Content-Length` from the actual
/// forwarded body.
fn shape_response(
    status: StatusCode,
    upstream_headers: HeaderMap,
    body: Bytes,
) -> Response<ForwardBody> {
    let mut headers = HeaderMap::with_capacity(upstream_headers.len() + 1);
    for (name, value) in upstream_headers.iter() {
        if HOP_BY_HOP_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(
        http::header::CONTENT_LENGTH,
        body.len().to_string().parse().expect("digits are valid header value"),
    );

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_response_strips_hop_by_hop_and_recomputes_length() {
        let mut upstream = HeaderMap::new();
        upstream.insert(http::header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        upstream.insert(http::header::CONNECTION, "keep-alive".parse().unwrap());
        upstream.append(http::header::SET_COOKIE, "a=1".parse().unwrap());
        upstream.append(http::header::SET_COOKIE, "b=2".parse().unwrap());

        let resp = shape_response(StatusCode::OK, upstream, Bytes::from_static(b"hello"));
        assert!(!resp.headers().contains_key(http::header::TRANSFER_ENCODING));
        assert!(!resp.headers().contains_key(http::header::CONNECTION));
        assert_eq!(resp.headers().get(http::header::CONTENT_LENGTH).unwrap(), "5");

        let cookies: Vec<_> = resp
            .headers()
            .get_all(http::header::SET_COOKIE)
            .iter()
            .collect();
        assert_eq!(cookies.len(), 2, "multi-valued headers must not be folded");
    }
}
