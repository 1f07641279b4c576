//! Integration tests for the control-plane REST API, driven through the
//! real `axum::Router` with `tower::ServiceExt::oneshot` rather than calling
//! handlers directly.

use ando_admin::server::{build_router, AdminState};
use ando_core::route::RouteData;
use ando_core::store::RouteStore;
use ando_store::MemoryStore;
use axum::body::{to_bytes, Body};
use axum::http::{header::AUTHORIZATION, Method, Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

fn state(auth_token: Option<&str>) -> Arc<AdminState> {
    AdminState::new(Arc::new(MemoryStore::new()), auth_token.map(str::to_string))
}

fn req(method: Method, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(AUTHORIZATION, format!("token {t}"));
    }
    builder.body(body).unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn create_list_get_delete_round_trip() {
    let s = state(None);

    let resp = build_router(s.clone())
        .oneshot(req(
            Method::POST,
            "/api/routes/svc",
            None,
            Body::from(r#"{"target":"http://127.0.0.1:9001"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = build_router(s.clone())
        .oneshot(req(Method::GET, "/api/routes", None, Body::empty()))
        .await
        .unwrap();
    let j = body_json(resp).await;
    assert_eq!(j.as_object().unwrap().len(), 1);

    let resp = build_router(s.clone())
        .oneshot(req(Method::GET, "/api/routes/svc", None, Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let j = body_json(resp).await;
    assert_eq!(j["target"], "http://127.0.0.1:9001");

    let resp = build_router(s.clone())
        .oneshot(req(Method::DELETE, "/api/routes/svc", None, Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = build_router(s)
        .oneshot(req(Method::GET, "/api/routes/svc", None, Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn auth_required_when_token_configured() {
    let s = state(Some("sekret"));

    let unauthenticated = build_router(s.clone())
        .oneshot(req(Method::GET, "/api/routes", None, Body::empty()))
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), StatusCode::FORBIDDEN);

    let authenticated = build_router(s)
        .oneshot(req(Method::GET, "/api/routes", Some("sekret"), Body::empty()))
        .await
        .unwrap();
    assert_eq!(authenticated.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_rejects_body_without_target() {
    let s = state(None);
    let resp = build_router(s)
        .oneshot(req(
            Method::POST,
            "/api/routes/bad",
            None,
            Body::from(r#"{"note":"missing target"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nested_path_round_trips_through_wildcard_route() {
    let s = state(None);
    let resp = build_router(s.clone())
        .oneshot(req(
            Method::POST,
            "/api/routes/a/b/c",
            None,
            Body::from(r#"{"target":"http://upstream"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    assert_eq!(
        s.store.get("/a/b/c").await.unwrap().unwrap().target(),
        Some("http://upstream")
    );
}

#[tokio::test]
async fn list_filters_by_inactive_since_query_param() {
    let store = MemoryStore::new();
    store.add("/stale", RouteData::with_target("http://stale")).await.unwrap();
    store.add("/fresh", RouteData::with_target("http://fresh")).await.unwrap();
    let day_ago = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();
    store
        .update("/stale", serde_json::json!({"last_activity": day_ago}))
        .await
        .unwrap();

    let s = AdminState::new(Arc::new(store), None);
    let threshold = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    let resp = build_router(s)
        .oneshot(req(
            Method::GET,
            &format!("/api/routes?inactive_since={threshold}"),
            None,
            Body::empty(),
        ))
        .await
        .unwrap();
    let j = body_json(resp).await;
    let obj = j.as_object().unwrap();
    assert_eq!(obj.len(), 1);
    assert!(obj.contains_key("/stale"));
}
