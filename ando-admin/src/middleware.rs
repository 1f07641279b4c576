//! Bearer-token authentication for the control plane (spec §4.H).
//!
//! When `auth_token` is unset the API is intentionally open — `AdminState`
//! construction logs a startup warning for that case; this middleware just
//! passes every request through.

use crate::server::AdminState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;

/// Literal scheme the `Authorization` header must carry: `token <secret>`,
/// case-sensitive on the word `token`.
const AUTH_SCHEME: &str = "token";

pub async fn require_auth(
    State(state): State<Arc<AdminState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.auth_token else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(char::is_whitespace))
        .filter(|(scheme, _)| *scheme == AUTH_SCHEME)
        .map(|(_, token)| token);

    match presented {
        Some(token) if token == expected => next.run(request).await,
        _ => (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "missing or invalid Authorization token", "status": 403})),
        )
            .into_response(),
    }
}
