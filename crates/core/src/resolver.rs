//! Address resolution
//!
//! Turns an address string into a [`TraversalConfig`]: the matched node ids
//! for every level of the path, the resolved target, and the chunker a
//! traversal drives. Failures that happen here never escape as errors; they
//! are recorded on the returned config.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::NodeCache;
use crate::chunker::{ChunkLimits, Chunker, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::listing::{ListQuery, Lister};
use crate::path::{Address, ROOT_ID, parse_address};
use crate::traits::{DriveStore, Node};

/// Per-run traversal parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    /// Descend into folders
    pub recurse: bool,
    /// Store sort expression
    pub order_by: Option<String>,
    /// Maximum number of files reported; `None` is unbounded
    pub max_items: Option<u64>,
    /// Leading items of the top-level listing to skip
    pub offset: u64,
    /// Items requested per page
    pub chunk_size: u32,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            recurse: false,
            order_by: None,
            max_items: None,
            offset: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl RunParams {
    /// Limits for the top-level chunker
    ///
    /// `max_items` counts files only, so it is enforced by the traversal and
    /// never caps the listing itself.
    pub fn limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_items: None,
            offset: self.offset,
            chunk_size: self.chunk_size,
        }
    }
}

/// Structured resolution failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecError {
    pub message: String,
    pub code: u16,
    pub error: Error,
}

impl From<Error> for SpecError {
    fn from(error: Error) -> Self {
        Self {
            message: error.to_string(),
            code: error.code(),
            error,
        }
    }
}

impl std::fmt::Display for SpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Result of resolving an address
///
/// A config is either ok, carrying a chunker, or failed, carrying an error;
/// both are derived from the single `error` slot so they can never disagree.
#[derive(Debug, Default)]
pub struct TraversalConfig {
    /// Address as given
    pub spec: String,
    /// Parsed address, absent when parsing failed
    pub address: Option<Address>,
    pub params: RunParams,
    /// Matched ids per level, root level first; the last entry is the leaf set
    pub unfolders: Vec<Vec<String>>,
    /// Ids the chunker will yield
    pub file_ids: Vec<String>,
    /// The single resolved target, with its path, when there is exactly one
    pub file: Option<Node>,
    pub is_root: bool,
    pub is_folder: bool,
    /// Top-level chunker; held by the traversal while it runs
    pub chunker: Option<Chunker>,
    error: Option<SpecError>,
}

impl TraversalConfig {
    fn new(spec: &str, params: RunParams) -> Self {
        Self {
            spec: spec.to_string(),
            params,
            ..Self::default()
        }
    }

    pub fn ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&SpecError> {
        self.error.as_ref()
    }

    fn fail(mut self, error: Error) -> Self {
        info!(spec = %self.spec, %error, "resolution failed");
        self.error = Some(error.into());
        self.chunker = None;
        self.file = None;
        self.file_ids.clear();
        self
    }
}

/// Resolves addresses against one store and cache
#[derive(Debug, Clone)]
pub struct Resolver {
    lister: Lister,
}

impl Resolver {
    pub fn new(store: Arc<dyn DriveStore>, cache: Arc<NodeCache>) -> Self {
        Self {
            lister: Lister::new(store, cache),
        }
    }

    pub fn lister(&self) -> &Lister {
        &self.lister
    }

    pub fn cache(&self) -> &Arc<NodeCache> {
        self.lister.cache()
    }

    /// Resolve an address string
    pub async fn resolve(&self, spec: &str, params: RunParams) -> TraversalConfig {
        let config = TraversalConfig::new(spec, params);
        let address = match parse_address(spec) {
            Ok(address) => address,
            Err(error) => return config.fail(error),
        };

        let outcome = match &address {
            Address::Root => self.resolve_root(config).await,
            Address::Id(id) | Address::Link { id, .. } => {
                let id = id.clone();
                self.resolve_id(config, &id).await
            }
            Address::Path(segments) => {
                let segments = segments.clone();
                self.resolve_segments(config, &segments).await
            }
        };

        match outcome {
            Ok(mut config) => {
                config.address = Some(address);
                config
            }
            Err((config, error)) => {
                let mut config = config.fail(error);
                config.address = Some(address);
                config
            }
        }
    }

    /// Cache-first lookup of the store root
    pub async fn root(&self) -> Result<Node> {
        if let Some(root) = self.cache().get(ROOT_ID) {
            return Ok(root);
        }
        let root = self.lister.fetch_node(ROOT_ID).await?;
        self.cache().put_alias(ROOT_ID, &root);
        Ok(root)
    }

    /// `gd://`: list the root's children
    async fn resolve_root(
        &self,
        mut config: TraversalConfig,
    ) -> std::result::Result<TraversalConfig, (TraversalConfig, Error)> {
        let root = match self.root().await {
            Ok(root) => root,
            Err(error) => return Err((config, error)),
        };

        let query = ListQuery::children_of(root.id.clone(), config.params.order_by.clone());
        let chunker = match self.lister.children(query, config.params.limits()) {
            Ok(chunker) => chunker,
            Err(error) => return Err((config, error)),
        };

        config.unfolders = vec![vec![root.id.clone()], Vec::new()];
        config.is_root = true;
        config.is_folder = true;
        config.file = self.cache().with_file_path(&root.id).ok();
        config.chunker = Some(chunker);
        Ok(config)
    }

    /// `gd:<id>` and shared links: point lookup, then rebuild the ancestry
    async fn resolve_id(
        &self,
        mut config: TraversalConfig,
        id: &str,
    ) -> std::result::Result<TraversalConfig, (TraversalConfig, Error)> {
        let node = match self.lister.fetch_node(id).await {
            Ok(node) => node,
            Err(error) => {
                let error = not_found(error, &config.spec);
                return Err((config, error));
            }
        };
        if id == ROOT_ID {
            self.cache().put_alias(ROOT_ID, &node);
        }

        let mut unfolders = match self.refolder(&node).await {
            Ok(levels) => levels,
            Err(error) => return Err((config, error)),
        };
        unfolders.push(vec![node.id.clone()]);

        let file = match self.cache().with_file_path(&node.id) {
            Ok(file) => file,
            Err(error) => return Err((config, error)),
        };

        debug!(id = %node.id, path = ?file.file_path, "resolved id");
        config.is_root = node.is_root();
        config.is_folder = node.is_folder();
        config.unfolders = unfolders;
        config.file_ids = vec![node.id.clone()];
        config.chunker = Some(
            self.lister
                .cached_nodes(config.file_ids.clone(), config.params.limits()),
        );
        config.file = Some(file);
        Ok(config)
    }

    /// Walk parent links up to the root, caching every ancestor
    ///
    /// Returns one single-id level per ancestor, root first. A node with more
    /// than one parent, or an ancestor that is not a folder, is rejected.
    pub async fn refolder(&self, node: &Node) -> Result<Vec<Vec<String>>> {
        let mut levels = Vec::new();
        let mut current = node.clone();

        while !current.is_root() {
            if current.parents.len() != 1 {
                return Err(Error::BadSpec(format!(
                    "multiple parents not supported - {} has {}",
                    current.id,
                    current.parents.len()
                )));
            }
            let parent = self.lister.node(&current.parents[0]).await?;
            if !parent.is_folder() {
                return Err(Error::BadSpec(format!(
                    "{} is not a folder - it's {}",
                    parent.name, parent.mime_type
                )));
            }
            if levels.iter().any(|level: &Vec<String>| level[0] == parent.id) {
                return Err(Error::InvalidNode(format!("parent cycle at {}", parent.id)));
            }
            levels.push(vec![parent.id.clone()]);
            current = parent;
        }

        levels.reverse();
        Ok(levels)
    }

    /// `gd://a/b/c`: expand each segment among the previous level's ids
    async fn resolve_segments(
        &self,
        mut config: TraversalConfig,
        segments: &[String],
    ) -> std::result::Result<TraversalConfig, (TraversalConfig, Error)> {
        let root = match self.root().await {
            Ok(root) => root,
            Err(error) => return Err((config, error)),
        };
        let mut unfolders = vec![vec![root.id]];

        for (index, segment) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();
            let parent_ids = unfolders.last().cloned().unwrap_or_default();
            let matches = match self
                .match_segment(segment, parent_ids, !is_last, &config.params)
                .await
            {
                Ok(matches) => matches,
                Err(error) => return Err((config, error)),
            };
            debug!(segment, matched = matches.len(), "segment resolved");
            unfolders.push(matches);
        }

        let file_ids = unfolders.last().cloned().unwrap_or_default();
        let nodes: Vec<Node> = file_ids
            .iter()
            .filter_map(|id| self.cache().get(id))
            .collect();
        config.is_folder = !nodes.is_empty() && nodes.iter().all(Node::is_folder);
        config.file = match file_ids.as_slice() {
            [only] => self.cache().with_file_path(only).ok(),
            _ => None,
        };
        config.chunker = Some(
            self.lister
                .cached_nodes(file_ids.clone(), config.params.limits()),
        );
        config.file_ids = file_ids;
        config.unfolders = unfolders;
        Ok(config)
    }

    /// Ids of every child of `parent_ids` whose name matches `segment`
    async fn match_segment(
        &self,
        segment: &str,
        parent_ids: Vec<String>,
        folders_only: bool,
        params: &RunParams,
    ) -> Result<Vec<String>> {
        // nothing matched the previous level, so nothing can match here
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = ListQuery {
            parent_ids,
            pattern: Some(segment.to_string()),
            folders_only,
            order_by: params.order_by.clone(),
            add_file_path: false,
        };
        let mut chunker = self
            .lister
            .children(query, ChunkLimits::with_chunk_size(params.chunk_size))?;

        let mut matches = Vec::new();
        while let Some(node) = chunker.next().await? {
            matches.push(node.id);
        }
        Ok(matches)
    }
}

/// Point lookups report a missing target as 404 whatever the transport said
fn not_found(error: Error, spec: &str) -> Error {
    if error.is_not_found() {
        Error::NotFound(format!("{spec}: {error}"))
    } else {
        error
    }
}
