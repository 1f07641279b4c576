//! `/api/routes` handlers (spec §4.H): list/filter, exact get, create,
//! delete. Path components arrive percent-decoded before reaching the
//! store, and `inactive_since`/`inactiveSince` are both accepted on the
//! list endpoint.

use crate::server::AdminState;
use ando_core::store::filter_inactive_since;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default, alias = "inactiveSince")]
    inactive_since: Option<String>,
}

fn decode_path(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw)
        .decode_utf8_lossy()
        .into_owned()
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into(), "status": status.as_u16()}))).into_response()
}

/// `GET /api/routes[?inactive_since=...|inactiveSince=...]`
pub async fn list_routes(
    State(state): State<Arc<AdminState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let routes = match state.store.get_all().await {
        Ok(r) => r,
        Err(e) => return error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let routes = match query.inactive_since {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(threshold) => filter_inactive_since(routes, threshold.with_timezone(&Utc)),
            Err(_) => return error_json(StatusCode::BAD_REQUEST, format!("invalid ISO-8601 date: {raw}")),
        },
        None => routes,
    };

    Json(routes).into_response()
}

/// `GET /api/routes/<path>`
pub async fn get_route(State(state): State<Arc<AdminState>>, Path(raw_path): Path<String>) -> Response {
    let path = decode_path(&raw_path);
    match state.store.get(&path).await {
        Ok(Some(data)) => Json(data).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, format!("no route at {path}")),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `POST /api/routes/<path>` with a JSON body that must carry `target`.
pub async fn create_route(
    State(state): State<Arc<AdminState>>,
    Path(raw_path): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let path = decode_path(&raw_path);
    let Some(obj) = body.as_object() else {
        return error_json(StatusCode::BAD_REQUEST, "request body must be a JSON object");
    };
    if !matches!(obj.get("target"), Some(Value::String(_))) {
        return error_json(StatusCode::BAD_REQUEST, "route data must include a string \"target\"");
    }

    let data = ando_core::route::RouteData::new(body);
    if let Err(e) = state.store.add(&path, data).await {
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    crate::persist::save_state(&state).await;

    match state.store.get(&path).await {
        Ok(Some(stored)) => (StatusCode::CREATED, Json(stored)).into_response(),
        _ => StatusCode::CREATED.into_response(),
    }
}

/// `DELETE /api/routes/<path>`
pub async fn delete_route(State(state): State<Arc<AdminState>>, Path(raw_path): Path<String>) -> Response {
    let path = decode_path(&raw_path);
    match state.store.remove(&path).await {
        Ok(Some(_)) => {
            crate::persist::save_state(&state).await;
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(None) => error_json(StatusCode::NOT_FOUND, format!("no route at {path}")),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
