//! Path canonicalization and segmentation, shared by the trie, the route
//! store, and the proxy core's request matching.

/// Canonicalize a route path: ensure a leading `/`, and strip a single
/// trailing `/` unless the result would be the empty string (the root `/`
/// is the only path allowed to end with `/`).
pub fn canonical(raw: &str) -> String {
    let mut s = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    };
    if s.len() > 1 && s.ends_with('/') {
        s.pop();
    }
    s
}

/// Split a canonical (or raw) path into its non-empty segments.
///
/// `segments("/")` and `segments("")` both yield `[]`.
pub fn segments(path: &str) -> Vec<String> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_adds_leading_slash() {
        assert_eq!(canonical("foo/bar"), "/foo/bar");
    }

    #[test]
    fn canonical_strips_trailing_slash() {
        assert_eq!(canonical("/foo/bar/"), "/foo/bar");
    }

    #[test]
    fn canonical_keeps_root() {
        assert_eq!(canonical("/"), "/");
        assert_eq!(canonical(""), "/");
    }

    #[test]
    fn canonical_is_idempotent() {
        for s in ["/", "/a", "/a/b/", "c/d", ""] {
            let once = canonical(s);
            let twice = canonical(&once);
            assert_eq!(once, twice, "canonical({s:?}) not idempotent");
        }
    }

    #[test]
    fn segments_splits_on_slash() {
        assert_eq!(segments("/a/b/c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn segments_of_root_is_empty() {
        assert!(segments("/").is_empty());
        assert!(segments("").is_empty());
    }

    #[test]
    fn segments_drops_empty_parts() {
        assert_eq!(segments("//a//b/"), vec!["a", "b"]);
    }
}
