//! The storage-agnostic route contract. Both the in-memory and the
//! database-backed implementations (in `ando-store`) are built against this
//! trait; `ando-proxy` and `ando-admin` only ever see `Arc<dyn RouteStore>`.

use crate::error::AndoError;
use crate::route::{RouteData, TargetMatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Pluggable backend for the live routing table.
///
/// Every mutating method treats its path as canonical-on-write: backends
/// are expected to call [`crate::path::canonical`] before touching storage,
/// so callers may pass raw, un-normalized paths.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Register (or overwrite) `path` with `data`. Sets `last_activity` to
    /// now; `data` must already carry a `target`, or callers should reject
    /// the request before reaching the store (the REST layer does this).
    async fn add(&self, path: &str, data: RouteData) -> Result<(), AndoError>;

    /// Merge `patch`'s top-level keys into the existing route at `path`.
    /// Fails with [`AndoError::RouteNotFound`] if no route is registered
    /// there.
    async fn update(&self, path: &str, patch: serde_json::Value) -> Result<(), AndoError>;

    /// Remove the route at `path`, returning its prior data if one existed.
    /// For the database backend, and for the in-memory trie, removing `/`
    /// only clears its data — the root node/row itself is never deleted.
    async fn remove(&self, path: &str) -> Result<Option<RouteData>, AndoError>;

    /// Exact lookup — does not consult ancestors.
    async fn get(&self, path: &str) -> Result<Option<RouteData>, AndoError>;

    /// Longest-prefix-match lookup.
    async fn get_target(&self, path: &str) -> Result<Option<TargetMatch>, AndoError>;

    /// Every registered route, keyed by canonical path.
    async fn get_all(&self) -> Result<BTreeMap<String, RouteData>, AndoError>;

    /// Shorthand for `update(path, {"last_activity": now})`.
    async fn touch(&self, path: &str) -> Result<(), AndoError>;
}

/// Filter a route map down to entries whose `last_activity` is strictly
/// before `threshold`, or entries with no recorded activity at all (treated
/// as "inactive since the beginning of time").
///
/// Shared by both backends' `get_all`-plus-filter REST handler path so the
/// `inactive_since`/`inactiveSince` semantics stay identical regardless of
/// which store answered the query.
pub fn filter_inactive_since(
    routes: BTreeMap<String, RouteData>,
    threshold: DateTime<Utc>,
) -> BTreeMap<String, RouteData> {
    routes
        .into_iter()
        .filter(|(_, data)| match data.last_activity() {
            Some(last) => last < threshold,
            None => true,
        })
        .collect()
}

/// Generate the ancestor-path sequence for `path`, longest to shortest,
/// always ending at `/`: used by database-backed stores to emulate
/// longest-prefix-match with a sequence of point lookups.
///
/// Ported from the original Python implementation's
/// `TableTrie._split_routes`: for `/a/b/c` yields `["/a/b/c", "/a/b",
/// "/a", "/"]`.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let canon = crate::path::canonical(path);
    let parts = crate::path::segments(&canon);
    let mut out = Vec::with_capacity(parts.len() + 1);
    for i in (0..=parts.len()).rev() {
        if i == 0 {
            out.push("/".to_string());
        } else {
            out.push(format!("/{}", parts[..i].join("/")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ancestor_paths_longest_to_shortest() {
        assert_eq!(
            ancestor_paths("/a/b/c"),
            vec!["/a/b/c", "/a/b", "/a", "/"]
        );
    }

    #[test]
    fn ancestor_paths_of_root_is_just_root() {
        assert_eq!(ancestor_paths("/"), vec!["/"]);
    }

    #[test]
    fn filter_inactive_since_excludes_recent() {
        let mut routes = BTreeMap::new();
        let mut recent = RouteData::with_target("http://a");
        recent.set_last_activity(Utc::now());
        let mut old = RouteData::with_target("http://b");
        old.set_last_activity(Utc::now() - chrono::Duration::hours(24));
        routes.insert("/recent".to_string(), recent);
        routes.insert("/old".to_string(), old);

        let threshold = Utc::now() - chrono::Duration::hours(1);
        let filtered = filter_inactive_since(routes, threshold);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("/old"));
    }

    #[test]
    fn filter_inactive_since_includes_routes_without_activity() {
        let mut routes = BTreeMap::new();
        routes.insert(
            "/never-touched".to_string(),
            RouteData::new(json!({"target": "http://a"})),
        );
        let filtered = filter_inactive_since(routes, Utc::now());
        assert_eq!(filtered.len(), 1);
    }
}
