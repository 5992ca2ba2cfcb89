//! Pagination engine
//!
//! A [`Chunker`] turns a page-at-a-time fetcher into a forward-only lazy
//! sequence of nodes. Pages are fetched one at a time and only when the
//! buffered values run out. Once a chunker reports exhaustion it never calls
//! its fetcher again.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::Node;

/// Default number of items requested per page
pub const DEFAULT_CHUNK_SIZE: u32 = 100;

/// Item limits for one chunker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    /// Maximum number of items to yield; `None` is unbounded
    pub max_items: Option<u64>,
    /// Number of leading items to skip
    pub offset: u64,
    /// Items requested per page
    pub chunk_size: u32,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_items: None,
            offset: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkLimits {
    pub fn with_chunk_size(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }
}

/// Fetch-continuation state, owned by the chunker
///
/// The fetcher receives a copy by value and never mutates the chunker's
/// state; the chunker advances it after each page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    /// Incremented on every advance
    pub version: u64,
    /// Token for the next page; `None` requests the first page
    pub page_token: Option<String>,
    /// Set once the store reported no further pages
    pub eof: bool,
    pub limits: ChunkLimits,
}

impl Continuation {
    pub fn new(limits: ChunkLimits) -> Self {
        Self {
            version: 0,
            page_token: None,
            eof: false,
            limits,
        }
    }

    /// The continuation after a page with the given next token
    pub fn advance(&self, next_page_token: Option<String>) -> Self {
        Self {
            version: self.version + 1,
            eof: next_page_token.is_none(),
            page_token: next_page_token,
            limits: self.limits,
        }
    }

    /// Whether `items` consumed values already satisfy the limits
    pub fn limit_reached(&self, items: u64) -> bool {
        self.limits
            .max_items
            .is_some_and(|max| items >= max.saturating_add(self.limits.offset))
    }

    /// Page size for the next request, never more than still needed
    pub fn page_size(&self, items: u64) -> u32 {
        let chunk = u64::from(self.limits.chunk_size.max(1));
        let wanted = match self.limits.max_items {
            Some(max) => chunk.min(
                max.saturating_add(self.limits.offset)
                    .saturating_sub(items),
            ),
            None => chunk,
        };
        u32::try_from(wanted).unwrap_or(u32::MAX)
    }
}

/// One fetcher response
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    /// A possibly empty batch plus the token for the following page
    Values {
        values: Vec<Node>,
        next_page_token: Option<String>,
    },
    /// Nothing more to fetch
    Done,
}

/// Produces pages for a chunker
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page described by `continuation`, at most `page_size` items
    async fn fetch(&mut self, continuation: Continuation, page_size: u32) -> Result<Page>;
}

/// Consumption counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkerStats {
    /// Values consumed, including any skipped by the offset
    pub items: u64,
    /// Pages fetched
    pub pages: u64,
}

/// Single-pass lazy sequence over paginated results
pub struct Chunker {
    label: String,
    fetcher: Box<dyn PageFetcher>,
    continuation: Continuation,
    buffer: VecDeque<Node>,
    stats: ChunkerStats,
    eof: bool,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("label", &self.label)
            .field("continuation", &self.continuation)
            .field("buffered", &self.buffer.len())
            .field("stats", &self.stats)
            .field("eof", &self.eof)
            .finish()
    }
}

impl Chunker {
    pub fn new(
        label: impl Into<String>,
        fetcher: impl PageFetcher + 'static,
        limits: ChunkLimits,
    ) -> Self {
        Self {
            label: label.into(),
            fetcher: Box::new(fetcher),
            continuation: Continuation::new(limits),
            buffer: VecDeque::new(),
            stats: ChunkerStats::default(),
            eof: false,
        }
    }

    /// Human-readable description of what this chunker lists
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stats(&self) -> ChunkerStats {
        self.stats
    }

    pub fn continuation(&self) -> &Continuation {
        &self.continuation
    }

    /// Whether exhaustion has been reported; such a chunker must not be reused
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Pull the next value, fetching a page if the buffer is empty
    ///
    /// Returns `Ok(None)` once exhausted, and keeps doing so without calling
    /// the fetcher. Fetcher errors are returned as-is and leave the state
    /// untouched.
    pub async fn next(&mut self) -> Result<Option<Node>> {
        loop {
            if self.eof {
                return Ok(None);
            }
            if self.continuation.limit_reached(self.stats.items) {
                return Ok(self.finish());
            }

            if let Some(node) = self.buffer.pop_front() {
                self.stats.items += 1;
                if self.stats.items <= self.continuation.limits.offset {
                    continue;
                }
                return Ok(Some(node));
            }

            if self.continuation.eof {
                return Ok(self.finish());
            }

            let page_size = self.continuation.page_size(self.stats.items);
            debug!(
                chunker = %self.label,
                page_size,
                version = self.continuation.version,
                "fetching page"
            );
            let page = self
                .fetcher
                .fetch(self.continuation.clone(), page_size)
                .await?;
            self.stats.pages += 1;

            match page {
                Page::Values {
                    values,
                    next_page_token,
                } => {
                    debug!(chunker = %self.label, values = values.len(), "page fetched");
                    self.buffer.extend(values);
                    self.continuation = self.continuation.advance(next_page_token);
                }
                Page::Done => return Ok(self.finish()),
            }
        }
    }

    /// Drain every remaining value
    pub async fn collect_all(&mut self) -> Result<Vec<Node>> {
        if self.eof {
            return Err(Error::ChunkerExhausted);
        }
        let mut nodes = Vec::new();
        while let Some(node) = self.next().await? {
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Consume the chunker as a stream of nodes
    pub fn into_stream(self) -> BoxStream<'static, Result<Node>> {
        stream::try_unfold(self, |mut chunker| async move {
            let next = chunker.next().await?;
            Ok::<_, Error>(next.map(|node| (node, chunker)))
        })
        .boxed()
    }

    fn finish(&mut self) -> Option<Node> {
        self.eof = true;
        self.buffer.clear();
        debug!(chunker = %self.label, items = self.stats.items, "exhausted");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `total` numbered files in pages, recording each request
    struct Numbers {
        total: usize,
        calls: Arc<AtomicUsize>,
        sizes: Arc<std::sync::Mutex<Vec<u32>>>,
        fail_at: Option<usize>,
    }

    impl Numbers {
        fn new(total: usize) -> Self {
            Self {
                total,
                calls: Arc::new(AtomicUsize::new(0)),
                sizes: Arc::new(std::sync::Mutex::new(Vec::new())),
                fail_at: None,
            }
        }
    }

    #[async_trait]
    impl PageFetcher for Numbers {
        async fn fetch(&mut self, continuation: Continuation, page_size: u32) -> Result<Page> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.sizes.lock().unwrap().push(page_size);
            if self.fail_at == Some(call) {
                return Err(Error::transport(503, "backend unavailable"));
            }
            let start: usize = continuation
                .page_token
                .as_deref()
                .map(|t| t.parse().unwrap())
                .unwrap_or(0);
            let end = (start + page_size as usize).min(self.total);
            let values = (start..end)
                .map(|i| Node::file(format!("f{i}"), format!("file{i}"), "r0"))
                .collect();
            let next_page_token = (end < self.total).then(|| end.to_string());
            Ok(Page::Values {
                values,
                next_page_token,
            })
        }
    }

    fn ids(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_pages_until_eof() {
        let fetcher = Numbers::new(5);
        let calls = fetcher.calls.clone();
        let mut chunker = Chunker::new("numbers", fetcher, ChunkLimits::with_chunk_size(2));

        let nodes = chunker.collect_all().await.unwrap();
        assert_eq!(ids(&nodes), vec!["f0", "f1", "f2", "f3", "f4"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(chunker.stats().items, 5);
        assert_eq!(chunker.stats().pages, 3);
        assert!(chunker.is_eof());
        assert_eq!(chunker.continuation().version, 3);
    }

    #[tokio::test]
    async fn test_no_fetch_after_exhaustion() {
        let fetcher = Numbers::new(1);
        let calls = fetcher.calls.clone();
        let mut chunker = Chunker::new("numbers", fetcher, ChunkLimits::default());

        assert!(chunker.next().await.unwrap().is_some());
        assert!(chunker.next().await.unwrap().is_none());
        let after = calls.load(Ordering::SeqCst);
        assert!(chunker.next().await.unwrap().is_none());
        assert!(chunker.next().await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), after);
        assert_eq!(
            chunker.collect_all().await.unwrap_err(),
            Error::ChunkerExhausted
        );
    }

    #[tokio::test]
    async fn test_page_size_never_exceeds_remaining() {
        let fetcher = Numbers::new(100);
        let sizes = fetcher.sizes.clone();
        let limits = ChunkLimits {
            max_items: Some(5),
            offset: 0,
            chunk_size: 3,
        };
        let mut chunker = Chunker::new("numbers", fetcher, limits);

        let nodes = chunker.collect_all().await.unwrap();
        assert_eq!(nodes.len(), 5);
        assert_eq!(*sizes.lock().unwrap(), vec![3, 2]);
        assert!(chunker.is_eof());
    }

    #[tokio::test]
    async fn test_offset_skips_leading_items() {
        let limits = ChunkLimits {
            max_items: Some(2),
            offset: 3,
            chunk_size: 10,
        };
        let mut chunker = Chunker::new("numbers", Numbers::new(10), limits);

        let nodes = chunker.collect_all().await.unwrap();
        assert_eq!(ids(&nodes), vec!["f3", "f4"]);
        assert_eq!(chunker.stats().items, 5);
    }

    #[tokio::test]
    async fn test_empty_pages_are_skipped() {
        struct Sparse {
            pages: VecDeque<(Vec<Node>, Option<String>)>,
        }

        #[async_trait]
        impl PageFetcher for Sparse {
            async fn fetch(&mut self, _: Continuation, _: u32) -> Result<Page> {
                Ok(match self.pages.pop_front() {
                    Some((values, next_page_token)) => Page::Values {
                        values,
                        next_page_token,
                    },
                    None => Page::Done,
                })
            }
        }

        let fetcher = Sparse {
            pages: VecDeque::from(vec![
                (vec![], Some("a".to_string())),
                (vec![], Some("b".to_string())),
                (vec![Node::file("f9", "nine", "r0")], None),
            ]),
        };
        let mut chunker = Chunker::new("sparse", fetcher, ChunkLimits::default());
        let nodes = chunker.collect_all().await.unwrap();
        assert_eq!(ids(&nodes), vec!["f9"]);
        assert_eq!(chunker.stats().pages, 3);
        assert_eq!(chunker.stats().items, 1);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let mut fetcher = Numbers::new(10);
        fetcher.fail_at = Some(1);
        let mut chunker = Chunker::new("numbers", fetcher, ChunkLimits::with_chunk_size(4));

        for _ in 0..4 {
            assert!(chunker.next().await.unwrap().is_some());
        }
        let err = chunker.next().await.unwrap_err();
        assert_eq!(err.code(), 503);
        assert!(!chunker.is_eof());
        assert_eq!(chunker.stats().items, 4);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let chunker = Chunker::new("numbers", Numbers::new(7), ChunkLimits::with_chunk_size(3));
        let nodes: Vec<Node> = chunker.into_stream().try_collect().await.unwrap();
        assert_eq!(nodes.len(), 7);
    }

    #[test]
    fn test_continuation_advance() {
        let start = Continuation::new(ChunkLimits::default());
        let next = start.advance(Some("t1".to_string()));
        assert_eq!(next.version, 1);
        assert!(!next.eof);
        let last = next.advance(None);
        assert_eq!(last.version, 2);
        assert!(last.eof);
        assert!(last.page_token.is_none());
        // the original value is untouched
        assert_eq!(start.version, 0);
    }
}
