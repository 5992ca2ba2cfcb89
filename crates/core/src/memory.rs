//! In-memory DriveStore
//!
//! A single-parent tree held in memory, with the same paging and filtering
//! contract as the remote store. Calls are counted so callers can check how
//! much work an operation sent to the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::path::ROOT_ID;
use crate::traits::{DriveStore, ListPage, ListRequest, Node};

const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory tree store
#[derive(Debug)]
pub struct MemoryStore {
    root_id: String,
    /// Insertion order is the unsorted listing order
    nodes: Vec<Node>,
    failures: Mutex<HashMap<String, Error>>,
    last_request: Mutex<Option<ListRequest>>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(root: Node) -> Self {
        Self {
            root_id: root.id.clone(),
            nodes: vec![root],
            failures: Mutex::new(HashMap::new()),
            last_request: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Add a node
    pub fn with(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Make every listing that includes `parent_id` fail with `error`
    pub fn fail_listing(&self, parent_id: impl Into<String>, error: Error) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(parent_id.into(), error);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// The most recent listing request
    pub fn last_request(&self) -> Option<ListRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn matches(node: &Node, request: &ListRequest) -> bool {
        let parent_ok = request.parent_ids.is_empty()
            || node.parents.iter().any(|p| request.parent_ids.contains(p));
        let name_ok = request.name.as_ref().is_none_or(|name| &node.name == name);
        let kind_ok = !request.folders_only || node.is_folder();
        !node.is_root() && parent_ok && name_ok && kind_ok
    }
}

#[async_trait]
impl DriveStore for MemoryStore {
    async fn list(&self, request: ListRequest) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        {
            let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(error) = request.parent_ids.iter().find_map(|p| failures.get(p)) {
                return Err(error.clone());
            }
        }

        let mut items: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|node| Self::matches(node, &request))
            .collect();
        if let Some(order_by) = &request.order_by {
            items.sort_by(|a, b| a.name.cmp(&b.name));
            if order_by.trim_start().starts_with("name desc") {
                items.reverse();
            }
        }

        let start = match request.page_token.as_deref() {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::transport(400, format!("Invalid page token {token}")))?,
            None => 0,
        };
        let page_size = match request.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n as usize,
        };
        let end = start.saturating_add(page_size).min(items.len());
        let page = items
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|node| (*node).clone())
            .collect();

        Ok(ListPage {
            items: page,
            next_page_token: (end < items.len()).then(|| end.to_string()),
        })
    }

    async fn get_by_id(&self, id: &str) -> Result<Node> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let id = if id == ROOT_ID { self.root_id.as_str() } else { id };
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .cloned()
            .ok_or_else(|| Error::transport(404, format!("File not found: {id}")))
    }
}
