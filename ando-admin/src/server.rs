//! Wiring for the control-plane listener: the shared state every handler
//! closes over, and the `axum::Router` that mounts `/api/routes`.

use crate::handlers;
use crate::middleware::require_auth;
use ando_core::store::RouteStore;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared state for the control-plane API.
pub struct AdminState {
    pub store: Arc<dyn RouteStore>,
    /// `None` means the API is intentionally open; [`AdminState::new`] logs
    /// a warning once for that case, per spec.md §4.H.
    pub auth_token: Option<String>,
    /// Where to snapshot the routing table after each mutation, for the
    /// in-memory backend. `None` for the database backend, which is already
    /// durable, and for tests that don't exercise persistence.
    pub state_file: Option<PathBuf>,
}

impl AdminState {
    pub fn new(store: Arc<dyn RouteStore>, auth_token: Option<String>) -> Arc<Self> {
        Self::with_state_file(store, auth_token, None)
    }

    pub fn with_state_file(
        store: Arc<dyn RouteStore>,
        auth_token: Option<String>,
        state_file: Option<PathBuf>,
    ) -> Arc<Self> {
        if auth_token.is_none() {
            warn!("auth_token is not configured — the control API is open to any caller");
        }
        Arc::new(Self {
            store,
            auth_token,
            state_file,
        })
    }
}

/// Build the control-plane `axum::Router`: `/api/routes` for listing (with
/// the `inactive_since`/`inactiveSince` filter) and `/api/routes/<path>` for
/// per-route GET/POST/DELETE, both behind the bearer-token middleware.
pub fn build_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/api/routes", get(handlers::routes::list_routes))
        .route(
            "/api/routes/{*path}",
            get(handlers::routes::get_route)
                .post(handlers::routes::create_route)
                .delete(handlers::routes::delete_route),
        )
        .layer(from_fn_with_state(state.clone(), require_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the control plane until the process is told to shut down.
pub async fn serve(
    addr: std::net::SocketAddr,
    state: Arc<AdminState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "control plane listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
