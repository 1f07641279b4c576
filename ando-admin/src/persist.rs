//! File-based persistence for the in-memory backend.
//!
//! On every write (create/update/delete route) the current routing table is
//! serialized to a JSON file. On startup the file is loaded back into the
//! store so data survives restarts. Irrelevant for the database backend,
//! which is already durable and never calls into this module.
//!
//! The file is written atomically: first to a `.tmp` sibling, then renamed
//! over the final path, so a crash mid-write never corrupts the stored state.
//!
//! A no-op when `AdminState::state_file` is `None`.

use crate::server::AdminState;
use ando_core::route::RouteData;
use ando_core::store::RouteStore;
use std::collections::BTreeMap;
use std::path::Path;

/// Write `routes` to `path` atomically: serialize, write to a `.tmp`
/// sibling, then rename over the final path.
fn save_snapshot(path: &Path, routes: &BTreeMap<String, RouteData>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(routes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)
}

/// Read a previously saved snapshot back. Returns `None` if the file does
/// not exist or cannot be parsed — both are treated as "start fresh",
/// logging a warning for the latter.
fn load_snapshot(path: &Path) -> Option<BTreeMap<String, RouteData>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "persist: no state file found, starting fresh");
        return None;
    }

    let data = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "persist: failed to read state file");
            return None;
        }
    };

    match serde_json::from_str(&data) {
        Ok(routes) => Some(routes),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "persist: state file is malformed, ignoring");
            None
        }
    }
}

/// Snapshot the live routing table to `state.state_file`, if configured.
/// Logs a warning rather than failing the caller's request on I/O errors.
pub async fn save_state(state: &AdminState) {
    let Some(path) = &state.state_file else {
        return;
    };

    let routes = match state.store.get_all().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "persist: failed to snapshot route store");
            return;
        }
    };

    if let Err(e) = save_snapshot(path, &routes) {
        tracing::warn!(error = %e, path = %path.display(), "persist: failed to write state file");
        return;
    }

    tracing::debug!(path = %path.display(), count = routes.len(), "persist: state saved");
}

/// Load a previously saved snapshot into `store`.
///
/// Each route is re-added with a fresh `last_activity` timestamp; the
/// restored process treats every route as just-touched rather than
/// preserving the exact moment it was last used before restart.
pub async fn load_state(path: &Path, store: &dyn RouteStore) {
    let Some(routes) = load_snapshot(path) else {
        return;
    };

    let count = routes.len();
    for (route_path, data) in routes {
        if let Err(e) = store.add(&route_path, data).await {
            tracing::warn!(error = %e, path = %route_path, "persist: failed to restore route");
        }
    }

    tracing::info!(count, path = %path.display(), "persist: state restored from file");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_preserves_routes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut routes = BTreeMap::new();
        routes.insert("/a".to_string(), RouteData::with_target("http://127.0.0.1:1"));
        routes.insert("/a/b".to_string(), RouteData::with_target("http://127.0.0.1:2"));

        save_snapshot(&path, &routes).unwrap();
        let loaded = load_snapshot(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["/a"].target(), Some("http://127.0.0.1:1"));
        assert_eq!(loaded["/a/b"].target(), Some("http://127.0.0.1:2"));
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");
        assert!(load_snapshot(&path).is_none());
    }

    #[test]
    fn load_malformed_file_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not valid json {{{{").unwrap();
        assert!(load_snapshot(&path).is_none());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("state.json");
        save_snapshot(&path, &BTreeMap::new()).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn load_state_populates_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut routes = BTreeMap::new();
        routes.insert("/x".to_string(), RouteData::with_target("http://x"));
        save_snapshot(&path, &routes).unwrap();

        let store = ando_store::MemoryStore::new();
        load_state(&path, &store).await;

        assert_eq!(store.get("/x").await.unwrap().unwrap().target(), Some("http://x"));
    }

    #[tokio::test]
    async fn save_state_is_noop_without_state_file() {
        let store: std::sync::Arc<dyn RouteStore> = std::sync::Arc::new(ando_store::MemoryStore::new());
        let state = AdminState::new(store, None);
        save_state(&state).await;
    }
}
