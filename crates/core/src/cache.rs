//! Node metadata cache
//!
//! Every successful list or point lookup records its nodes here. The cache is
//! the only source used to derive a node's full path: walking `parents[0]`
//! never touches the network, so callers must have cached the ancestor chain
//! first.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::path::ROOT_MARKER;
use crate::traits::Node;

/// Process-lifetime id → node map with last-write-wins semantics
#[derive(Debug, Default)]
pub struct NodeCache {
    nodes: RwLock<HashMap<String, Node>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node, replacing any entry with the same id
    pub fn put(&self, node: Node) -> Result<Node> {
        if node.id.is_empty() {
            return Err(Error::InvalidNode(format!(
                "node '{}' has no id",
                node.name
            )));
        }
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    /// Record the node under an extra id, e.g. the `root` alias
    pub fn put_alias(&self, alias: &str, node: &Node) {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        nodes.insert(alias.to_string(), node.clone());
    }

    /// Look up a node; absent ids yield `None`
    pub fn get(&self, id: &str) -> Option<Node> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(id).cloned()
    }

    /// Look up a node that must already be cached
    pub fn require(&self, id: &str) -> Result<Node> {
        if id.is_empty() {
            return Err(Error::CacheMiss("missing id".into()));
        }
        self.get(id)
            .ok_or_else(|| Error::CacheMiss(format!("node {id}")))
    }

    /// Derive the full path of a cached node by walking its parents
    ///
    /// The root resolves to the bare root marker; every other node resolves
    /// to the marker followed by the `/`-joined names below the root.
    pub fn resolve_path(&self, id: &str) -> Result<String> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut node = nodes
            .get(id)
            .ok_or_else(|| Error::CacheMiss(format!("node {id}")))?;

        let mut names = Vec::new();
        let mut hops = 0;
        while let Some(parent_id) = node.parents.first() {
            names.push(node.name.as_str());
            node = nodes
                .get(parent_id)
                .ok_or_else(|| Error::CacheMiss(format!("parent {parent_id} of {id}")))?;
            hops += 1;
            if hops > nodes.len() {
                return Err(Error::InvalidNode(format!("parent cycle at {id}")));
            }
        }

        names.reverse();
        Ok(format!("{ROOT_MARKER}{}", names.join("/")))
    }

    /// Copy of a cached node with its derived path filled in
    pub fn with_file_path(&self, id: &str) -> Result<Node> {
        let mut node = self.require(id)?;
        node.file_path = Some(self.resolve_path(id)?);
        Ok(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cache() -> NodeCache {
        let cache = NodeCache::new();
        cache.put(Node::root("r0", "My Drive")).unwrap();
        cache.put(Node::folder("d1", "public", "r0")).unwrap();
        cache.put(Node::folder("d2", "gormenghast", "d1")).unwrap();
        cache.put(Node::file("f1", "Steerpike.pdf", "d2")).unwrap();
        cache
    }

    #[test]
    fn test_put_overwrites() {
        let cache = NodeCache::new();
        cache.put(Node::file("f1", "old.txt", "r0")).unwrap();
        cache
            .put(Node::file("f1", "new.txt", "r0").with_size(7))
            .unwrap();

        assert_eq!(cache.len(), 1);
        let node = cache.get("f1").unwrap();
        assert_eq!(node.name, "new.txt");
        assert_eq!(node.size, Some(7));
    }

    #[test]
    fn test_put_rejects_missing_id() {
        let cache = NodeCache::new();
        let result = cache.put(Node::file("", "orphan.txt", "r0"));
        assert!(matches!(result, Err(Error::InvalidNode(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_require_missing() {
        let cache = NodeCache::new();
        assert!(cache.get("nope").is_none());
        assert!(matches!(cache.require("nope"), Err(Error::CacheMiss(_))));
        assert!(matches!(cache.require(""), Err(Error::CacheMiss(_))));
    }

    #[test]
    fn test_resolve_path() {
        let cache = sample_cache();
        assert_eq!(cache.resolve_path("r0").unwrap(), "gd://");
        assert_eq!(cache.resolve_path("d1").unwrap(), "gd://public");
        assert_eq!(
            cache.resolve_path("f1").unwrap(),
            "gd://public/gormenghast/Steerpike.pdf"
        );
    }

    #[test]
    fn test_resolve_path_missing_ancestor() {
        let cache = NodeCache::new();
        cache.put(Node::file("f1", "lost.txt", "d9")).unwrap();
        assert!(matches!(cache.resolve_path("f1"), Err(Error::CacheMiss(_))));
    }

    #[test]
    fn test_resolve_path_cycle() {
        let cache = NodeCache::new();
        cache.put(Node::folder("a", "a", "b")).unwrap();
        cache.put(Node::folder("b", "b", "a")).unwrap();
        assert!(matches!(cache.resolve_path("a"), Err(Error::InvalidNode(_))));
    }

    #[test]
    fn test_with_file_path() {
        let cache = sample_cache();
        let node = cache.with_file_path("d2").unwrap();
        assert_eq!(node.file_path.as_deref(), Some("gd://public/gormenghast"));
        // the cached copy stays untouched
        assert!(cache.get("d2").unwrap().file_path.is_none());
    }
}
