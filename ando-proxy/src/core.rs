//! URL resolution: turn an incoming request path (plus optional `Host`)
//! into a rewritten backend URL, per the matched route's rewrite policy.

use ando_core::error::AndoError;
use ando_core::route::TargetMatch;
use ando_core::store::RouteStore;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// The `prepend_path`/`include_prefix`/`x_forward`/`custom_headers`/
/// `host_routing` surface from `GatewayConfig`, carried separately so
/// `ProxyCore` doesn't need the whole config struct.
#[derive(Debug, Clone, Default)]
pub struct ProxyOptions {
    pub prepend_path: bool,
    pub include_prefix: bool,
    pub x_forward: bool,
    pub custom_headers: HashMap<String, String>,
    pub host_routing: bool,
}

impl ProxyOptions {
    pub fn from_config(cfg: &ando_core::config::GatewayConfig) -> Self {
        Self {
            prepend_path: cfg.prepend_path,
            include_prefix: cfg.include_prefix,
            x_forward: cfg.x_forward,
            custom_headers: cfg.custom_headers.clone(),
            host_routing: cfg.host_routing,
        }
    }
}

/// The outcome of resolving a request: where to forward it.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub prefix: String,
    pub url: Url,
}

/// Holds the route store and rewrite policy; stateless otherwise.
///
/// Generalizes the donor's `ando-core::router::Router::match_route` (radix
/// lookup + rewrite) to this spec's longest-prefix trie lookup and
/// prepend/include-prefix rewrite policy.
pub struct ProxyCore {
    store: Arc<dyn RouteStore>,
    options: ProxyOptions,
}

impl ProxyCore {
    pub fn new(store: Arc<dyn RouteStore>, options: ProxyOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn RouteStore> {
        &self.store
    }

    /// Resolve `raw_path` (as taken from the request line, still
    /// percent-encoded) and optional `host` (used only when `host_routing`
    /// is enabled) to a rewritten backend URL.
    pub async fn resolve(
        &self,
        raw_path: &str,
        query: Option<&str>,
        host: Option<&str>,
    ) -> Result<Option<ResolvedTarget>, AndoError> {
        let decoded_path = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|e| AndoError::BadRequest(format!("invalid percent-encoding: {e}")))?
            .into_owned();

        let lookup_path = if self.options.host_routing {
            synthesize_host_path(host, &decoded_path)
        } else {
            decoded_path.clone()
        };

        let Some(TargetMatch { prefix, data }) = self.store.get_target(&lookup_path).await? else {
            return Ok(None);
        };
        let target = data
            .target()
            .ok_or_else(|| AndoError::StoreError(format!("route {prefix} has no target")))?;
        let target_url = Url::parse(target)
            .map_err(|e| AndoError::StoreError(format!("route {prefix} target {target}: {e}")))?;

        let url = self.rewrite(&target_url, &prefix, &decoded_path, query)?;
        Ok(Some(ResolvedTarget { prefix, url }))
    }

    fn rewrite(
        &self,
        target: &Url,
        prefix: &str,
        request_path: &str,
        request_query: Option<&str>,
    ) -> Result<Url, AndoError> {
        let remaining = if self.options.include_prefix {
            request_path.to_string()
        } else {
            strip_prefix_path(request_path, prefix)
        };

        let mut url = target.clone();
        let final_path = if self.options.prepend_path {
            join_paths(target.path(), &remaining)
        } else if remaining.is_empty() {
            "/".to_string()
        } else {
            remaining
        };
        url.set_path(&final_path);

        let final_query = if self.options.prepend_path {
            join_queries(target.query(), request_query)
        } else {
            request_query.map(str::to_string)
        };
        url.set_query(final_query.as_deref());

        Ok(url)
    }
}

/// Apply the `custom_headers`/`x_forward` policy to an outbound request's
/// headers, in place. Configured `custom_headers` entries override any
/// incoming header of the same name (case-insensitive, since `HeaderMap`
/// keys already compare that way); `X-Forwarded-*` use append-to-list
/// semantics for `-For`/`-Port`/`-Proto` and only set `-Host` if absent.
pub fn apply_header_policy(
    headers: &mut http::HeaderMap,
    options: &ProxyOptions,
    peer_ip: Option<std::net::IpAddr>,
    scheme: &str,
    incoming_host: Option<&str>,
) -> Result<(), AndoError> {
    for (k, v) in &options.custom_headers {
        let name = http::HeaderName::try_from(k.as_str())
            .map_err(|e| AndoError::BadRequest(format!("bad custom header name {k}: {e}")))?;
        let value = http::HeaderValue::try_from(v.as_str())
            .map_err(|e| AndoError::BadRequest(format!("bad custom header value for {k}: {e}")))?;
        headers.insert(name, value);
    }

    if !options.x_forward {
        return Ok(());
    }

    if let Some(ip) = peer_ip {
        append_header_value(headers, "x-forwarded-for", &ip.to_string())?;
    }
    let port = incoming_host
        .and_then(|h| h.rsplit_once(':').map(|(_, p)| p.to_string()))
        .unwrap_or_else(|| if scheme == "https" { "443" } else { "80" }.to_string());
    append_header_value(headers, "x-forwarded-port", &port)?;
    append_header_value(headers, "x-forwarded-proto", scheme)?;

    if !headers.contains_key("x-forwarded-host") {
        if let Some(host) = incoming_host {
            headers.insert(
                http::HeaderName::from_static("x-forwarded-host"),
                http::HeaderValue::try_from(host)
                    .map_err(|e| AndoError::BadRequest(format!("bad host header: {e}")))?,
            );
        }
    }
    Ok(())
}

fn append_header_value(
    headers: &mut http::HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), AndoError> {
    let name = http::HeaderName::from_static(name);
    let new_value = http::HeaderValue::try_from(value)
        .map_err(|e| AndoError::BadRequest(format!("bad header value for {name}: {e}")))?;
    match headers.get(&name).and_then(|v| v.to_str().ok()) {
        Some(existing) => {
            let joined = format!("{existing}, {value}");
            headers.insert(
                name,
                http::HeaderValue::try_from(joined)
                    .map_err(|e| AndoError::BadRequest(e.to_string()))?,
            );
        }
        None => {
            headers.insert(name, new_value);
        }
    }
    Ok(())
}

/// Hop-by-hop headers that every response shaper strips before relaying to
/// the downstream client — they are re-derived by the response writer.
pub const HOP_BY_HOP_RESPONSE_HEADERS: [&str; 4] =
    ["content-length", "transfer-encoding", "content-encoding", "connection"];

/// Build the path the trie is matched against under `host_routing`: the
/// `Host` header becomes a synthesized leading path segment.
fn synthesize_host_path(host: Option<&str>, path: &str) -> String {
    match host {
        Some(h) => format!("/{h}{path}"),
        None => path.to_string(),
    }
}

fn strip_prefix_path(path: &str, prefix: &str) -> String {
    if prefix == "/" {
        return path.to_string();
    }
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

fn join_paths(base: &str, req: &str) -> String {
    let base_trimmed = base.trim_end_matches('/');
    if req.is_empty() {
        if base_trimmed.is_empty() {
            "/".to_string()
        } else {
            base_trimmed.to_string()
        }
    } else if base_trimmed.is_empty() {
        req.to_string()
    } else {
        format!("{base_trimmed}{req}")
    }
}

fn join_queries(target_query: Option<&str>, request_query: Option<&str>) -> Option<String> {
    match (
        target_query.filter(|q| !q.is_empty()),
        request_query.filter(|q| !q.is_empty()),
    ) {
        (Some(t), Some(r)) => Some(format!("{t}&{r}")),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(r)) => Some(r.to_string()),
        (None, None) => None,
    }
}
