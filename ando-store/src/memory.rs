//! In-process route store: a `DashMap` for O(1) exact lookups mirrored by
//! an `UrlTrie` for longest-prefix-match, kept in step under one lock per
//! mutation.

use ando_core::error::AndoError;
use ando_core::path::canonical;
use ando_core::route::{RouteData, TargetMatch};
use ando_core::store::RouteStore;
use ando_core::trie::UrlTrie;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// The default `storage_backend = "memory"` implementation.
///
/// `routes` answers exact `get`/`get_all` directly from the donor's
/// `ConfigCache`-style `DashMap`; `trie` answers `get_target`. The two are
/// always mutated together inside `mutate`'s write guard, so a reader never
/// observes one updated without the other.
pub struct MemoryStore {
    routes: DashMap<String, RouteData>,
    trie: RwLock<UrlTrie>,
    /// Serializes add/update/remove/touch so the `DashMap` write and the
    /// trie write that accompany it land as one unit from an external
    /// observer's point of view.
    write_gate: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
            trie: RwLock::new(UrlTrie::new()),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Seed a single route at construction time, e.g. from
    /// `GatewayConfig::default_target` — bypasses the async trait so the
    /// caller doesn't need a runtime just to build the initial state.
    pub fn seed(&self, path: &str, data: RouteData) {
        let path = canonical(path);
        self.routes.insert(path.clone(), data.clone());
        self.trie.write().expect("trie lock poisoned").add(&path, data);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    async fn add(&self, path: &str, mut data: RouteData) -> Result<(), AndoError> {
        let path = canonical(path);
        let _guard = self.write_gate.lock().await;
        data.set_last_activity(chrono::Utc::now());
        self.routes.insert(path.clone(), data.clone());
        self.trie
            .write()
            .map_err(|_| AndoError::StoreError("trie lock poisoned".into()))?
            .add(&path, data);
        Ok(())
    }

    async fn update(&self, path: &str, patch: serde_json::Value) -> Result<(), AndoError> {
        let path = canonical(path);
        let patch = patch
            .as_object()
            .ok_or_else(|| AndoError::BadRequest("patch must be a JSON object".into()))?
            .clone();
        let _guard = self.write_gate.lock().await;
        let mut entry = self
            .routes
            .get_mut(&path)
            .ok_or_else(|| AndoError::RouteNotFound(path.clone()))?;
        entry.merge(&patch);
        let updated = entry.clone();
        drop(entry);
        self.trie
            .write()
            .map_err(|_| AndoError::StoreError("trie lock poisoned".into()))?
            .add(&path, updated);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<Option<RouteData>, AndoError> {
        let path = canonical(path);
        let _guard = self.write_gate.lock().await;
        let previous = if path == "/" {
            // Root data is cleared, but the row/node itself is never
            // removed (it has no data to remove once cleared).
            self.routes.get(&path).map(|r| r.value().clone())
        } else {
            self.routes.remove(&path).map(|(_, v)| v)
        };
        self.trie
            .write()
            .map_err(|_| AndoError::StoreError("trie lock poisoned".into()))?
            .remove(&path);
        if path == "/" {
            self.routes.remove(&path);
        }
        Ok(previous)
    }

    async fn get(&self, path: &str) -> Result<Option<RouteData>, AndoError> {
        let path = canonical(path);
        Ok(self.routes.get(&path).map(|r| r.value().clone()))
    }

    async fn get_target(&self, path: &str) -> Result<Option<TargetMatch>, AndoError> {
        let trie = self
            .trie
            .read()
            .map_err(|_| AndoError::StoreError("trie lock poisoned".into()))?;
        Ok(trie.get(path).and_then(|node| {
            node.data().map(|data| TargetMatch {
                prefix: node.prefix().to_string(),
                data: data.clone(),
            })
        }))
    }

    async fn get_all(&self) -> Result<BTreeMap<String, RouteData>, AndoError> {
        Ok(self
            .routes
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect())
    }

    async fn touch(&self, path: &str) -> Result<(), AndoError> {
        self.update(
            path,
            serde_json::json!({ "last_activity": chrono::Utc::now().to_rfc3339() }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(target: &str) -> RouteData {
        RouteData::with_target(target)
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let store = MemoryStore::new();
        store.add("/a", route("http://x")).await.unwrap();
        let got = store.get("/a").await.unwrap().unwrap();
        assert_eq!(got.target(), Some("http://x"));
        assert!(got.last_activity().is_some());
    }

    #[tokio::test]
    async fn get_target_is_longest_prefix_match() {
        let store = MemoryStore::new();
        store.add("/a/b", route("http://ab")).await.unwrap();
        store.add("/a", route("http://a")).await.unwrap();

        let m = store.get_target("/a/b/c/d").await.unwrap().unwrap();
        assert_eq!(m.prefix, "/a/b");
        assert_eq!(m.target(), Some("http://ab"));
    }

    #[tokio::test]
    async fn get_target_matches_get_of_its_own_prefix() {
        let store = MemoryStore::new();
        store.add("/a/b", route("http://ab")).await.unwrap();
        let m = store.get_target("/a/b/extra").await.unwrap().unwrap();
        let direct = store.get(&m.prefix).await.unwrap().unwrap();
        assert_eq!(direct.target(), m.target());
    }

    #[tokio::test]
    async fn remove_clears_exact_and_prefix_lookup() {
        let store = MemoryStore::new();
        store.add("/a/b", route("http://ab")).await.unwrap();
        store.remove("/a/b").await.unwrap();
        assert!(store.get("/a/b").await.unwrap().is_none());
        assert!(store.get_target("/a/b/c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_root_clears_data_without_deleting_entry_permanently() {
        let store = MemoryStore::new();
        store.add("/", route("http://root")).await.unwrap();
        store.add("/a", route("http://a")).await.unwrap();
        store.remove("/").await.unwrap();
        assert!(store.get("/").await.unwrap().is_none());
        // sibling route is unaffected by clearing root.
        assert_eq!(
            store.get("/a").await.unwrap().unwrap().target(),
            Some("http://a")
        );
    }

    #[tokio::test]
    async fn update_merges_patch_and_errors_on_missing_route() {
        let store = MemoryStore::new();
        store.add("/a", route("http://a")).await.unwrap();
        store
            .update("/a", serde_json::json!({"note": "hi"}))
            .await
            .unwrap();
        let got = store.get("/a").await.unwrap().unwrap();
        assert_eq!(got.as_map().get("note").unwrap(), "hi");

        let err = store
            .update("/missing", serde_json::json!({"note": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn touch_updates_last_activity_monotonically() {
        let store = MemoryStore::new();
        store.add("/a", route("http://a")).await.unwrap();
        let before = store.get("/a").await.unwrap().unwrap().last_activity().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.touch("/a").await.unwrap();
        let after = store.get("/a").await.unwrap().unwrap().last_activity().unwrap();
        assert!(after >= before);
    }

    #[tokio::test]
    async fn get_all_returns_every_registered_route() {
        let store = MemoryStore::new();
        store.add("/a", route("http://a")).await.unwrap();
        store.add("/b", route("http://b")).await.unwrap();
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
