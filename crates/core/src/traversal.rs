//! Depth-first traversal
//!
//! [`traverse`] drives a resolved config's chunker and reports what it finds
//! through an [`Emitter`]. Folders are expanded with a work stack of pending
//! child chunkers instead of recursion, so a subtree is fully drained before
//! the walk returns to the parent's remaining siblings.

use tracing::{debug, info, warn};

use crate::chunker::{Chunker, ChunkerStats};
use crate::error::{Error, Result};
use crate::events::{Emitter, Event, EventKind, EventStats};
use crate::listing::Lister;
use crate::resolver::TraversalConfig;
use crate::traits::Node;

/// A folder whose children are being walked
struct Frame {
    folder: Node,
    chunker: Chunker,
}

/// How a walk over the top-level chunker ended
enum Outcome {
    Complete,
    Capped,
    Failed,
}

/// Walk a resolved config, emitting events
///
/// Emits `start`, then exactly one of:
/// - `nodata` when the config carries no chunker
/// - `error` when the chunker is already exhausted, or fails
/// - `end` once the walk completes
///
/// The chunker is handed back to `config` when the walk returns, so driving
/// the same config twice reports an exhausted chunker.
pub async fn traverse(lister: &Lister, config: &mut TraversalConfig, emitter: &mut Emitter<'_>) {
    let Some(mut chunker) = config.chunker.take() else {
        emitter.emit(&Event::Start { config: &*config });
        emitter.emit(&Event::NoData { config: &*config });
        return;
    };

    drive(lister, config, &mut chunker, emitter).await;
    config.chunker = Some(chunker);
}

async fn drive(
    lister: &Lister,
    config: &TraversalConfig,
    root: &mut Chunker,
    emitter: &mut Emitter<'_>,
) {
    emitter.emit(&Event::Start { config });

    if root.is_eof() {
        warn!(spec = %config.spec, "chunker reused after exhaustion");
        emitter.emit(&Event::Error {
            error: &Error::ChunkerExhausted,
            chunker: Some(&*root),
            config,
        });
        return;
    }

    let params = &config.params;
    let mut stack: Vec<Frame> = Vec::new();
    let mut files_seen: u64 = 0;

    let outcome = loop {
        let pulled = match stack.last_mut() {
            Some(frame) => frame.chunker.next().await,
            None => root.next().await,
        };

        match pulled {
            Ok(Some(node)) if node.is_folder() => {
                let children =
                    lister.folder_contents(&node.id, params.order_by.clone(), params.chunk_size);
                emitter.emit(&Event::Folder {
                    node: &node,
                    chunker: &children,
                    config,
                });
                if params.recurse {
                    debug!(folder = %node.name, depth = stack.len() + 1, "descending");
                    stack.push(Frame {
                        folder: node,
                        chunker: children,
                    });
                } else {
                    emitter.emit(&Event::FolderEnd {
                        node: &node,
                        chunker: &children,
                        config,
                    });
                }
            }
            Ok(Some(node)) => {
                files_seen += 1;
                if params.max_items.is_some_and(|max| files_seen > max) {
                    break Outcome::Capped;
                }
                let chunker = stack.last().map_or(&*root, |frame| &frame.chunker);
                emitter.emit(&Event::File {
                    node: &node,
                    chunker,
                    config,
                });
            }
            Ok(None) => match stack.pop() {
                Some(frame) => folder_end(emitter, config, frame),
                None => break Outcome::Complete,
            },
            Err(error) => match stack.pop() {
                Some(frame) => {
                    warn!(folder = %frame.folder.name, %error, "listing failed");
                    emitter.emit(&Event::Error {
                        error: &error,
                        chunker: Some(&frame.chunker),
                        config,
                    });
                    folder_end(emitter, config, frame);
                }
                None => {
                    warn!(spec = %config.spec, %error, "listing failed");
                    emitter.emit(&Event::Error {
                        error: &error,
                        chunker: Some(&*root),
                        config,
                    });
                    break Outcome::Failed;
                }
            },
        }
    };

    match outcome {
        Outcome::Failed => return,
        Outcome::Capped => {
            info!(max_items = ?params.max_items, "item limit reached");
            while let Some(frame) = stack.pop() {
                folder_end(emitter, config, frame);
            }
        }
        Outcome::Complete => {}
    }

    debug!(spec = %config.spec, files = files_seen, "walk complete");
    emitter.emit(&Event::End {
        chunker: &*root,
        config,
    });
}

fn folder_end(emitter: &mut Emitter<'_>, config: &TraversalConfig, frame: Frame) {
    debug!(folder = %frame.folder.name, "ascending");
    emitter.emit(&Event::FolderEnd {
        node: &frame.folder,
        chunker: &frame.chunker,
        config,
    });
}

/// Everything a completed walk reported
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    /// Every `file` event's node, in emission order
    pub files: Vec<Node>,
    /// Every `folder-end` event's node with its child chunker's counters
    pub folders: Vec<(Node, ChunkerStats)>,
    pub stats: EventStats,
}

/// Traverse and collect the results
///
/// Resolves to the first `error` event's error; `nodata` gives empty results.
pub async fn walk(lister: &Lister, config: &mut TraversalConfig) -> Result<WalkResult> {
    let mut files = Vec::new();
    let mut folders = Vec::new();
    let mut failure: Option<Error> = None;

    let stats = {
        let mut emitter = Emitter::new();
        emitter
            .on(EventKind::File, |event| {
                if let Some(node) = event.node() {
                    files.push(node.clone());
                }
            })
            .on(EventKind::FolderEnd, |event| {
                if let (Some(node), Some(chunker)) = (event.node(), event.chunker()) {
                    folders.push((node.clone(), chunker.stats()));
                }
            })
            .on(EventKind::Error, |event| {
                if let Event::Error { error, .. } = event {
                    failure.get_or_insert_with(|| (*error).clone());
                }
            });
        traverse(lister, config, &mut emitter).await;
        emitter.stats().clone()
    };

    match failure {
        Some(error) => Err(error),
        None => Ok(WalkResult {
            files,
            folders,
            stats,
        }),
    }
}
