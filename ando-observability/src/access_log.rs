//! Request-complete log lines (spec §7 / SPEC_FULL.md §12): one `tracing`
//! event per finished data-plane request, leveled by response status the
//! same way the Python reference's `on_finish` chooses `log.info`/`warn`/
//! `error`.

use tracing::{error, info, warn};

/// Emit the request-complete log line for one data-plane request.
///
/// `prefix` is the matched route prefix, if any (`None` on a 404 with no
/// match at all). Level follows status: `< 400` is INFO, `4xx` is WARN,
/// `>= 500` is ERROR.
pub fn log_request(method: &str, path: &str, status: u16, latency_ms: f64, prefix: Option<&str>) {
    let prefix = prefix.unwrap_or("-");
    if status < 400 {
        info!(method, path, status, latency_ms, prefix, "request complete");
    } else if status < 500 {
        warn!(method, path, status, latency_ms, prefix, "request complete");
    } else {
        error!(method, path, status, latency_ms, prefix, "request complete");
    }
}
