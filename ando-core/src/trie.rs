//! Longest-prefix-match trie over canonical URL paths.
//!
//! Owned-children, no back-pointers: `remove` is driven top-down and prunes
//! empty interior nodes on the way back up the call stack, so there is never
//! a need to walk upward from a child to its parent.

use crate::route::RouteData;
use crate::path::{canonical, segments};
use std::collections::HashMap;

/// A single node of the [`UrlTrie`].
#[derive(Debug, Default)]
pub struct TrieNode {
    prefix: String,
    branches: HashMap<String, TrieNode>,
    data: Option<RouteData>,
}

impl TrieNode {
    /// The canonical path from the trie root to this node.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The route data registered at this node, if any.
    pub fn data(&self) -> Option<&RouteData> {
        self.data.as_ref()
    }

    fn size(&self) -> usize {
        self.branches.len()
    }
}

/// A longest-prefix-match trie keyed on URL path segments.
#[derive(Debug, Default)]
pub struct UrlTrie {
    root: TrieNode,
}

impl UrlTrie {
    pub fn new() -> Self {
        Self {
            root: TrieNode {
                prefix: "/".to_string(),
                branches: HashMap::new(),
                data: None,
            },
        }
    }

    /// Insert or overwrite the data registered at `path`.
    pub fn add(&mut self, path: &str, data: RouteData) {
        let path = canonical(path);
        let parts = segments(&path);
        Self::add_at(&mut self.root, &parts, data);
    }

    fn add_at(node: &mut TrieNode, parts: &[String], data: RouteData) {
        let Some((part, rest)) = parts.split_first() else {
            node.data = Some(data);
            return;
        };
        let child = node.branches.entry(part.clone()).or_insert_with(|| {
            let prefix = if node.prefix == "/" {
                format!("/{part}")
            } else {
                format!("{}/{part}", node.prefix)
            };
            TrieNode {
                prefix,
                branches: HashMap::new(),
                data: None,
            }
        });
        Self::add_at(child, rest, data);
    }

    /// Remove the data registered at `path`, pruning any interior node left
    /// with neither data nor branches. The root is never removed, even if
    /// it ends up empty. Missing paths are a no-op.
    pub fn remove(&mut self, path: &str) {
        let path = canonical(path);
        let parts = segments(&path);
        Self::remove_at(&mut self.root, &parts);
    }

    /// Returns `true` if, after the removal, `node` itself carries neither
    /// data nor branches and should be pruned from its parent.
    fn remove_at(node: &mut TrieNode, parts: &[String]) -> bool {
        let Some((part, rest)) = parts.split_first() else {
            node.data = None;
            return node.should_prune();
        };
        let Some(child) = node.branches.get_mut(part) else {
            // Already absent; nothing to do.
            return false;
        };
        if Self::remove_at(child, rest) {
            node.branches.remove(part);
        }
        node.should_prune()
    }

    /// Longest-prefix-match lookup: returns the deepest ancestor (including
    /// the exact node, if it exists) that carries data.
    pub fn get(&self, path: &str) -> Option<&TrieNode> {
        let path = canonical(path);
        let parts = segments(&path);
        Self::get_at(&self.root, &parts)
    }

    fn get_at<'a>(node: &'a TrieNode, parts: &[String]) -> Option<&'a TrieNode> {
        let me = if node.data.is_some() { Some(node) } else { None };
        let Some((part, rest)) = parts.split_first() else {
            return me;
        };
        match node.branches.get(part) {
            None => me,
            Some(child) => Self::get_at(child, rest).or(me),
        }
    }
}

impl TrieNode {
    fn should_prune(&self) -> bool {
        self.data.is_none() && self.size() == 0
    }
}
