//! gd-core: Core library for the gd Drive CLI
//!
//! This crate provides the core functionality for gd, including:
//! - Address parsing (`gd://a/b`, `gd:<id>`, shared links)
//! - A node cache that derives full paths from parent links
//! - Lazy pagination over any page-at-a-time listing ([`Chunker`])
//! - Segment-by-segment path resolution with wildcard matching
//! - Depth-first traversal reported through typed events
//! - Configuration management
//!
//! The remote store is reached only through the [`DriveStore`] trait, so this
//! crate is independent of any HTTP stack and can be tested against
//! [`MemoryStore`].

pub mod cache;
pub mod chunker;
pub mod config;
pub mod error;
pub mod events;
pub mod listing;
pub mod memory;
pub mod path;
pub mod resolver;
pub mod traits;
pub mod traversal;
pub mod wildcard;

pub use cache::NodeCache;
pub use chunker::{ChunkLimits, Chunker, ChunkerStats, Continuation, Page, PageFetcher};
pub use config::{Config, ConfigManager, Defaults, DriveConfig, RetryConfig, TimeoutConfig};
pub use error::{Error, Result};
pub use events::{Emitter, Event, EventKind, EventStats};
pub use listing::{ListQuery, Lister};
pub use memory::MemoryStore;
pub use path::{Address, LinkKind, parse_address};
pub use resolver::{Resolver, RunParams, SpecError, TraversalConfig};
pub use traits::{DriveStore, ListPage, ListRequest, Node, NodeKind};
pub use traversal::{WalkResult, traverse, walk};
pub use wildcard::{Wildcard, has_wildcards};
