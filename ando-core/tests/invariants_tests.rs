//! Cross-module invariant tests for the path normalizer, trie, and route
//! store working together — the end-to-end properties spec.md §8 states
//! rather than any one module's isolated behavior.

use ando_core::path::canonical;
use ando_core::route::RouteData;
use ando_core::store::{ancestor_paths, filter_inactive_since};
use ando_core::trie::UrlTrie;
use chrono::Utc;
use std::collections::BTreeMap;

fn route(target: &str) -> RouteData {
    RouteData::with_target(target)
}

/// Invariant 1: `get(p)` returns data iff there was a prior `add(p, _)`
/// with no intervening `remove(p)`.
#[test]
fn get_reflects_latest_add_remove_sequence() {
    let mut trie = UrlTrie::new();
    assert!(trie.get("/a").is_none());

    trie.add("/a", route("http://1"));
    assert!(trie.get("/a").is_some());

    trie.remove("/a");
    assert!(trie.get("/a").is_none());

    trie.add("/a", route("http://2"));
    assert_eq!(trie.get("/a").unwrap().data().unwrap().target(), Some("http://2"));
}

/// Invariant 2/3: `get_target(p).prefix` is the longest registered
/// ancestor of `p`, and its data matches a direct `get` of that prefix.
#[test]
fn get_target_is_longest_matching_ancestor_and_agrees_with_get() {
    let mut trie = UrlTrie::new();
    trie.add("/a", route("http://a"));
    trie.add("/a/b/c", route("http://abc"));

    let deep = trie.get("/a/b/c/d/e").unwrap();
    assert_eq!(deep.prefix(), "/a/b/c");

    let shallow = trie.get("/a/b/x").unwrap();
    assert_eq!(shallow.prefix(), "/a");

    let direct = trie.get(shallow.prefix()).unwrap();
    assert_eq!(direct.data().unwrap().target(), shallow.data().unwrap().target());

    assert!(trie.get("/other/entirely").is_none());
}

/// Invariant 4: after removing a non-root path, no later lookup resolves
/// back to it as a prefix.
#[test]
fn removed_path_never_resurfaces_as_a_prefix_match() {
    let mut trie = UrlTrie::new();
    trie.add("/a", route("http://a"));
    trie.add("/a/b", route("http://ab"));
    trie.remove("/a/b");

    for probe in ["/a/b", "/a/b/c", "/a/b/c/d"] {
        let hit = trie.get(probe);
        if let Some(node) = hit {
            assert_ne!(node.prefix(), "/a/b", "probe {probe} resolved to the removed prefix");
        }
    }
    assert_eq!(trie.get("/a/b/c").unwrap().prefix(), "/a");
}

/// Invariant 5: canonicalization is idempotent across the inputs the
/// control plane and CLI are likely to hand it.
#[test]
fn canonical_is_idempotent_across_varied_inputs() {
    for raw in ["", "/", "a", "/a/", "/a/b/c/", "//weird//", "/already/canonical"] {
        let once = canonical(raw);
        assert_eq!(canonical(&once), once, "canonical({raw:?}) is not idempotent");
    }
}

/// `ancestor_paths` (the database backend's longest-prefix emulation) must
/// enumerate exactly the chain the trie would walk for the same query,
/// longest first, so both backends report the same `get_target` prefix
/// for the same registered set.
#[test]
fn ancestor_paths_matches_trie_longest_prefix_choice() {
    let mut trie = UrlTrie::new();
    trie.add("/svc", route("http://svc"));

    let query = "/svc/deep/path";
    let trie_prefix = trie.get(query).unwrap().prefix().to_string();

    let chain = ancestor_paths(query);
    let db_prefix = chain
        .iter()
        .find(|candidate| *candidate == "/svc")
        .expect("ancestor_paths must include the registered prefix");
    assert_eq!(&trie_prefix, db_prefix);
    assert_eq!(chain.last().unwrap(), "/");
}

/// `inactive_since` filtering composes correctly with a snapshot taken
/// from a populated routing table rather than a hand-built map.
#[test]
fn inactive_since_filter_over_a_populated_table() {
    let mut table: BTreeMap<String, RouteData> = BTreeMap::new();

    let mut fresh = route("http://fresh");
    fresh.set_last_activity(Utc::now());
    table.insert("/fresh".to_string(), fresh);

    let mut stale = route("http://stale");
    stale.set_last_activity(Utc::now() - chrono::Duration::hours(48));
    table.insert("/stale".to_string(), stale);

    let threshold = Utc::now() - chrono::Duration::hours(1);
    let filtered = filter_inactive_since(table, threshold);

    assert_eq!(filtered.len(), 1);
    assert!(filtered.contains_key("/stale"));
}
