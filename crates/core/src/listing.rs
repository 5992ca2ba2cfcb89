//! Store-backed chunkers
//!
//! [`Lister`] pairs a [`DriveStore`] with the [`NodeCache`] it populates and
//! builds the two kinds of chunker the resolver and traversal need: remote
//! children listings and replays of already cached nodes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::NodeCache;
use crate::chunker::{ChunkLimits, Chunker, Continuation, Page, PageFetcher};
use crate::error::Result;
use crate::traits::{DriveStore, ListRequest, Node};
use crate::wildcard::{Wildcard, has_wildcards};

/// What a children listing asks for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Children of any of these parents
    pub parent_ids: Vec<String>,
    /// Exact name or `*`/`?` pattern; `None` matches everything
    pub pattern: Option<String>,
    /// Only return folders
    pub folders_only: bool,
    /// Store sort expression
    pub order_by: Option<String>,
    /// Fill in `file_path` on every yielded node
    pub add_file_path: bool,
}

impl ListQuery {
    /// Every child of one folder, with paths
    pub fn children_of(parent_id: impl Into<String>, order_by: Option<String>) -> Self {
        Self {
            parent_ids: vec![parent_id.into()],
            pattern: None,
            folders_only: false,
            order_by,
            add_file_path: true,
        }
    }

    fn describe(&self) -> String {
        format!(
            "list {} in [{}]",
            self.pattern.as_deref().unwrap_or("*"),
            self.parent_ids.join(",")
        )
    }
}

/// Handle on the store and its cache
#[derive(Clone)]
pub struct Lister {
    store: Arc<dyn DriveStore>,
    cache: Arc<NodeCache>,
}

impl std::fmt::Debug for Lister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lister")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Lister {
    pub fn new(store: Arc<dyn DriveStore>, cache: Arc<NodeCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<NodeCache> {
        &self.cache
    }

    /// Point lookup against the store, recording the result
    pub async fn fetch_node(&self, id: &str) -> Result<Node> {
        let node = self.store.get_by_id(id).await?;
        debug!(id, name = %node.name, "fetched node");
        self.cache.put(node)
    }

    /// Cache-first lookup, going to the store only on a miss
    pub async fn node(&self, id: &str) -> Result<Node> {
        match self.cache.get(id) {
            Some(node) => Ok(node),
            None => self.fetch_node(id).await,
        }
    }

    /// Chunker over matching children of the query's parents
    pub fn children(&self, query: ListQuery, limits: ChunkLimits) -> Result<Chunker> {
        let label = query.describe();
        let fetcher = ListFetcher::new(self.clone(), query)?;
        Ok(Chunker::new(label, fetcher, limits))
    }

    /// Chunker over every child of one folder
    pub fn folder_contents(
        &self,
        folder_id: &str,
        order_by: Option<String>,
        chunk_size: u32,
    ) -> Chunker {
        let query = ListQuery::children_of(folder_id, order_by);
        Chunker::new(
            query.describe(),
            ListFetcher {
                lister: self.clone(),
                name: None,
                matcher: Wildcard::any(),
                query,
            },
            ChunkLimits::with_chunk_size(chunk_size),
        )
    }

    /// Chunker replaying cached nodes, each with its derived path
    pub fn cached_nodes(&self, ids: Vec<String>, limits: ChunkLimits) -> Chunker {
        Chunker::new(
            format!("cached [{}]", ids.join(",")),
            CachedFetcher {
                cache: self.cache.clone(),
                ids,
            },
            limits,
        )
    }
}

/// Pages through the store's children listing
struct ListFetcher {
    lister: Lister,
    query: ListQuery,
    /// Exact name the store can filter on
    name: Option<String>,
    /// Client-side filter for wildcard patterns
    matcher: Wildcard,
}

impl ListFetcher {
    fn new(lister: Lister, query: ListQuery) -> Result<Self> {
        let (name, matcher) = match query.pattern.as_deref() {
            None => (None, Wildcard::any()),
            Some(pattern) if has_wildcards(pattern) => (None, Wildcard::new(pattern)?),
            Some(pattern) => (Some(pattern.to_string()), Wildcard::any()),
        };
        Ok(Self {
            lister,
            query,
            name,
            matcher,
        })
    }
}

#[async_trait]
impl PageFetcher for ListFetcher {
    async fn fetch(&mut self, continuation: Continuation, page_size: u32) -> Result<Page> {
        let request = ListRequest {
            parent_ids: self.query.parent_ids.clone(),
            name: self.name.clone(),
            folders_only: self.query.folders_only,
            page_token: continuation.page_token,
            page_size,
            order_by: self.query.order_by.clone(),
        };
        let page = self.lister.store.list(request).await?;
        let cache = &self.lister.cache;

        let mut values = Vec::with_capacity(page.items.len());
        for node in page.items {
            if !self.matcher.matches(&node.name) {
                continue;
            }
            let mut node = cache.put(node)?;
            if self.query.add_file_path {
                node.file_path = Some(cache.resolve_path(&node.id)?);
            }
            values.push(node);
        }

        Ok(Page::Values {
            values,
            next_page_token: page.next_page_token,
        })
    }
}

/// Replays a fixed id list from the cache; the page token is the next index
struct CachedFetcher {
    cache: Arc<NodeCache>,
    ids: Vec<String>,
}

#[async_trait]
impl PageFetcher for CachedFetcher {
    async fn fetch(&mut self, continuation: Continuation, page_size: u32) -> Result<Page> {
        let start = continuation
            .page_token
            .as_deref()
            .and_then(|token| token.parse::<usize>().ok())
            .unwrap_or(0);
        if start >= self.ids.len() {
            return Ok(Page::Done);
        }

        let end = start.saturating_add(page_size as usize).min(self.ids.len());
        let values = self.ids[start..end]
            .iter()
            .map(|id| self.cache.with_file_path(id))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::Values {
            values,
            next_page_token: (end < self.ids.len()).then(|| end.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::MemoryStore;
    use crate::traits::MockDriveStore;

    fn sample_store() -> MemoryStore {
        MemoryStore::new(Node::root("r0", "My Drive"))
            .with(Node::folder("d1", "samplepdfs", "r0"))
            .with(Node::file("f1", "flyer.pdf", "d1"))
            .with(Node::file("f2", "example.pdf", "d1"))
            .with(Node::file("f3", "notes.txt", "d1"))
            .with(Node::folder("d2", "archive", "d1"))
    }

    fn lister(store: MemoryStore) -> (Lister, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let cache = Arc::new(NodeCache::new());
        (Lister::new(store.clone(), cache), store)
    }

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_children_with_paths() {
        let (lister, _store) = lister(sample_store());
        lister.fetch_node("r0").await.unwrap();
        lister.fetch_node("d1").await.unwrap();

        let mut chunker = lister.folder_contents("d1", Some("name".into()), 2);
        let nodes = chunker.collect_all().await.unwrap();
        assert_eq!(
            names(&nodes),
            vec!["archive", "example.pdf", "flyer.pdf", "notes.txt"]
        );
        assert_eq!(
            nodes[1].file_path.as_deref(),
            Some("gd://samplepdfs/example.pdf")
        );
        assert_eq!(chunker.stats().pages, 2);
    }

    #[tokio::test]
    async fn test_wildcard_filters_client_side() {
        let (lister, store) = lister(sample_store());
        let query = ListQuery {
            parent_ids: vec!["d1".into()],
            pattern: Some("*.pdf".into()),
            ..Default::default()
        };
        let nodes = lister
            .children(query, ChunkLimits::default())
            .unwrap()
            .collect_all()
            .await
            .unwrap();
        assert_eq!(names(&nodes), vec!["flyer.pdf", "example.pdf"]);
        // the store never saw a name filter
        assert_eq!(store.last_request().unwrap().name, None);
    }

    #[tokio::test]
    async fn test_exact_name_goes_to_store() {
        let (lister, store) = lister(sample_store());
        let query = ListQuery {
            parent_ids: vec!["d1".into()],
            pattern: Some("notes.txt".into()),
            ..Default::default()
        };
        let nodes = lister
            .children(query, ChunkLimits::default())
            .unwrap()
            .collect_all()
            .await
            .unwrap();
        assert_eq!(names(&nodes), vec!["notes.txt"]);
        assert_eq!(
            store.last_request().unwrap().name.as_deref(),
            Some("notes.txt")
        );
    }

    #[tokio::test]
    async fn test_listing_populates_cache() {
        let (lister, _store) = lister(sample_store());
        let query = ListQuery {
            parent_ids: vec!["d1".into()],
            folders_only: true,
            ..Default::default()
        };
        let nodes = lister
            .children(query, ChunkLimits::default())
            .unwrap()
            .collect_all()
            .await
            .unwrap();
        assert_eq!(names(&nodes), vec!["archive"]);
        assert!(lister.cache().get("d2").is_some());
    }

    #[tokio::test]
    async fn test_node_is_cache_first() {
        let (lister, store) = lister(sample_store());
        lister.node("d1").await.unwrap();
        lister.node("d1").await.unwrap();
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_nodes_replay() {
        let (lister, store) = lister(sample_store());
        for id in ["r0", "d1", "f1", "f2"] {
            lister.fetch_node(id).await.unwrap();
        }
        let calls = store.get_calls() + store.list_calls();

        let mut chunker =
            lister.cached_nodes(vec!["f2".into(), "f1".into()], ChunkLimits::with_chunk_size(1));
        let nodes = chunker.collect_all().await.unwrap();
        assert_eq!(names(&nodes), vec!["example.pdf", "flyer.pdf"]);
        assert_eq!(
            nodes[1].file_path.as_deref(),
            Some("gd://samplepdfs/flyer.pdf")
        );
        assert_eq!(store.get_calls() + store.list_calls(), calls);
    }

    #[tokio::test]
    async fn test_cached_nodes_empty() {
        let (lister, _store) = lister(sample_store());
        let mut chunker = lister.cached_nodes(Vec::new(), ChunkLimits::default());
        assert!(chunker.next().await.unwrap().is_none());
        assert!(chunker.is_eof());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut mock = MockDriveStore::new();
        mock.expect_list()
            .times(1)
            .returning(|_| Err(Error::transport(403, "quota exceeded")));
        let lister = Lister::new(Arc::new(mock), Arc::new(NodeCache::new()));

        let mut chunker = lister.folder_contents("d1", None, 10);
        let err = chunker.next().await.unwrap_err();
        assert_eq!(err, Error::transport(403, "quota exceeded"));
    }
}
