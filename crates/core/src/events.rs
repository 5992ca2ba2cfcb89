//! Traversal events
//!
//! A closed set of event kinds, each with its own payload, delivered through
//! a typed publish/subscribe [`Emitter`]. Every emission bumps a per-kind
//! counter before listeners run, synchronously and in registration order.

use std::collections::HashMap;
use std::str::FromStr;

use crate::chunker::Chunker;
use crate::error::{Error, Result};
use crate::resolver::TraversalConfig;
use crate::traits::Node;

/// Event kinds emitted by a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Start,
    File,
    Folder,
    FolderEnd,
    End,
    NoData,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Start,
        EventKind::File,
        EventKind::Folder,
        EventKind::FolderEnd,
        EventKind::End,
        EventKind::NoData,
        EventKind::Error,
    ];

    /// Wire name, e.g. `folder-end`
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::File => "file",
            EventKind::Folder => "folder",
            EventKind::FolderEnd => "folder-end",
            EventKind::End => "end",
            EventKind::NoData => "nodata",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    /// Accepts any casing: `folder-end`, `folderEnd`, `FOLDER_END`
    fn from_str(name: &str) -> Result<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.name().replace('-', "") == normalized)
            .ok_or_else(|| Error::Config(format!("unknown event '{name}'")))
    }
}

/// One traversal event and its payload
#[derive(Debug)]
pub enum Event<'a> {
    Start {
        config: &'a TraversalConfig,
    },
    File {
        node: &'a Node,
        chunker: &'a Chunker,
        config: &'a TraversalConfig,
    },
    /// `chunker` lists the folder's children
    Folder {
        node: &'a Node,
        chunker: &'a Chunker,
        config: &'a TraversalConfig,
    },
    FolderEnd {
        node: &'a Node,
        chunker: &'a Chunker,
        config: &'a TraversalConfig,
    },
    End {
        chunker: &'a Chunker,
        config: &'a TraversalConfig,
    },
    NoData {
        config: &'a TraversalConfig,
    },
    Error {
        error: &'a Error,
        chunker: Option<&'a Chunker>,
        config: &'a TraversalConfig,
    },
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start { .. } => EventKind::Start,
            Event::File { .. } => EventKind::File,
            Event::Folder { .. } => EventKind::Folder,
            Event::FolderEnd { .. } => EventKind::FolderEnd,
            Event::End { .. } => EventKind::End,
            Event::NoData { .. } => EventKind::NoData,
            Event::Error { .. } => EventKind::Error,
        }
    }

    /// The node this event is about, if any
    pub fn node(&self) -> Option<&Node> {
        match self {
            Event::File { node, .. }
            | Event::Folder { node, .. }
            | Event::FolderEnd { node, .. } => Some(*node),
            _ => None,
        }
    }

    pub fn chunker(&self) -> Option<&Chunker> {
        match self {
            Event::File { chunker, .. }
            | Event::Folder { chunker, .. }
            | Event::FolderEnd { chunker, .. }
            | Event::End { chunker, .. } => Some(*chunker),
            Event::Error { chunker, .. } => *chunker,
            Event::Start { .. } | Event::NoData { .. } => None,
        }
    }

    pub fn config(&self) -> &TraversalConfig {
        match self {
            Event::Start { config }
            | Event::File { config, .. }
            | Event::Folder { config, .. }
            | Event::FolderEnd { config, .. }
            | Event::End { config, .. }
            | Event::NoData { config }
            | Event::Error { config, .. } => *config,
        }
    }
}

/// Emission counts per event kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStats {
    counts: HashMap<EventKind, u64>,
}

impl EventStats {
    pub fn get(&self, kind: EventKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Count by any spelling of the event name; unknown names count zero
    pub fn get_by_name(&self, name: &str) -> u64 {
        name.parse().map(|kind| self.get(kind)).unwrap_or(0)
    }

    /// Kinds emitted at least once, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (EventKind, u64)> + '_ {
        EventKind::ALL
            .into_iter()
            .filter_map(|kind| self.counts.get(&kind).map(|count| (kind, *count)))
    }

    fn bump(&mut self, kind: EventKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }
}

type Listener<'l> = Box<dyn FnMut(&Event<'_>) + Send + 'l>;

/// Typed publish/subscribe dispatcher with emission statistics
#[derive(Default)]
pub struct Emitter<'l> {
    listeners: Vec<(Option<EventKind>, Listener<'l>)>,
    stats: EventStats,
}

impl std::fmt::Debug for Emitter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<'l> Emitter<'l> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind
    pub fn on(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&Event<'_>) + Send + 'l,
    ) -> &mut Self {
        self.listeners.push((Some(kind), Box::new(listener)));
        self
    }

    /// Register a listener by event name in any casing
    pub fn on_name(
        &mut self,
        name: &str,
        listener: impl FnMut(&Event<'_>) + Send + 'l,
    ) -> Result<&mut Self> {
        let kind = name.parse()?;
        Ok(self.on(kind, listener))
    }

    /// Register a listener for every event
    pub fn on_any(&mut self, listener: impl FnMut(&Event<'_>) + Send + 'l) -> &mut Self {
        self.listeners.push((None, Box::new(listener)));
        self
    }

    /// Count the event, then deliver it to matching listeners in order
    pub fn emit(&mut self, event: &Event<'_>) {
        let kind = event.kind();
        self.stats.bump(kind);
        for (filter, listener) in &mut self.listeners {
            if filter.is_none_or(|k| k == kind) {
                listener(event);
            }
        }
    }

    pub fn stats(&self) -> &EventStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_normalize() {
        for name in ["folder-end", "folderEnd", "FOLDER_END", "folder end"] {
            assert_eq!(name.parse::<EventKind>().unwrap(), EventKind::FolderEnd, "{name}");
        }
        assert_eq!("noData".parse::<EventKind>().unwrap(), EventKind::NoData);
        assert_eq!("nodata".parse::<EventKind>().unwrap(), EventKind::NoData);
        assert!("finish".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_round_trip_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.name().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_emit_counts_and_order() {
        let config = TraversalConfig::default();
        let mut seen = Vec::new();
        let mut any = 0;
        {
            let mut emitter = Emitter::new();
            emitter
                .on(EventKind::Start, |_| seen.push("first"))
                .on_any(|_| any += 1);
            emitter
                .on_name("start", |e| assert_eq!(e.kind(), EventKind::Start))
                .unwrap();

            emitter.emit(&Event::Start { config: &config });
            emitter.emit(&Event::NoData { config: &config });

            let stats = emitter.stats();
            assert_eq!(stats.get(EventKind::Start), 1);
            assert_eq!(stats.get(EventKind::NoData), 1);
            assert_eq!(stats.get(EventKind::End), 0);
            assert_eq!(stats.get_by_name("noData"), 1);
            assert_eq!(stats.get_by_name("bogus"), 0);
            assert_eq!(
                stats.iter().collect::<Vec<_>>(),
                vec![(EventKind::Start, 1), (EventKind::NoData, 1)]
            );
        }
        assert_eq!(seen, vec!["first"]);
        assert_eq!(any, 2);
    }

    #[test]
    fn test_counts_without_listeners() {
        let config = TraversalConfig::default();
        let mut emitter = Emitter::new();
        let error = Error::ChunkerExhausted;
        emitter.emit(&Event::Error {
            error: &error,
            chunker: None,
            config: &config,
        });
        assert_eq!(emitter.stats().get(EventKind::Error), 1);
    }
}
