//! DriveStore trait definition
//!
//! This trait defines the interface the core needs from the remote store.
//! It allows traversal and resolution to be decoupled from the HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// MIME type prefix for store-native documents
pub const NATIVE_TYPE_PREFIX: &str = "application/vnd.google-apps.";

/// MIME type the store uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields every list or get request must return
pub const MIN_FIELDS: &str = "id,name,mimeType,parents,size,modifiedTime";

/// Whether a node is an interior (folder) or leaf (file) entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    /// Derive the kind from a store MIME type
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            NodeKind::Folder
        } else {
            NodeKind::File
        }
    }
}

/// One entry in the remote tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Opaque, globally unique id
    pub id: String,

    /// Entry name (not unique among siblings)
    pub name: String,

    /// Store MIME type
    pub mime_type: String,

    /// Folder or file
    pub kind: NodeKind,

    /// Parent ids; empty for the root
    #[serde(default)]
    pub parents: Vec<String>,

    /// Size in bytes (absent for folders and native documents)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Last modification time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<jiff::Timestamp>,

    /// Derived full path; filled in from the cache, never authoritative
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Node {
    /// Create a new Node for a file
    pub fn file(id: impl Into<String>, name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: "application/octet-stream".to_string(),
            kind: NodeKind::File,
            parents: vec![parent.into()],
            size: None,
            modified_time: None,
            file_path: None,
        }
    }

    /// Create a new Node for a folder
    pub fn folder(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            kind: NodeKind::Folder,
            parents: vec![parent.into()],
            size: None,
            modified_time: None,
            file_path: None,
        }
    }

    /// Create the root folder
    pub fn root(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parents: Vec::new(),
            ..Self::folder(id, name, "")
        }
    }

    /// Set the MIME type, re-deriving the kind
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self.kind = NodeKind::from_mime_type(&self.mime_type);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Parameters for one page of a children listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Children of any of these parents are returned
    pub parent_ids: Vec<String>,

    /// Exact name to match; `None` lists every child
    pub name: Option<String>,

    /// Restrict results to folders
    pub folders_only: bool,

    /// Continuation token from the previous page
    pub page_token: Option<String>,

    /// Maximum number of items in this page
    pub page_size: u32,

    /// Store sort expression, e.g. "name asc,modifiedTime desc"
    pub order_by: Option<String>,
}

/// One page returned by a listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub items: Vec<Node>,

    /// Token for the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// Trait for the remote tree store
///
/// This trait is implemented by the Drive adapter and by the in-memory
/// store, and can be mocked for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriveStore: Send + Sync {
    /// List one page of children
    async fn list(&self, request: ListRequest) -> Result<ListPage>;

    /// Point lookup; a missing id fails with code 404
    async fn get_by_id(&self, id: &str) -> Result<Node>;
}
