//! Listing columns
//!
//! One [`Entry`] per listed node, and the helpers that render its columns:
//! a shortened MIME type, a binary human size, and a modification time that
//! drops the date for anything changed today.

use comfy_table::{CellAlignment, Table, presets};
use gd_core::traits::NATIVE_TYPE_PREFIX;
use gd_core::{Node, NodeKind};
use jiff::Timestamp;
use jiff::civil::Date;
use jiff::tz::TimeZone;
use serde::Serialize;

/// A listed node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: String,
    pub path: String,
    pub kind: NodeKind,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<Timestamp>,
}

impl From<&Node> for Entry {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            path: node.file_path.clone().unwrap_or_else(|| node.name.clone()),
            kind: node.kind,
            mime_type: node.mime_type.clone(),
            size: node.size,
            modified: node.modified_time,
        }
    }
}

/// Drop the common MIME prefixes; store-native types become `g-<kind>`
pub fn short_type(mime_type: &str) -> String {
    if let Some(native) = mime_type.strip_prefix(NATIVE_TYPE_PREFIX) {
        return format!("g-{native}");
    }
    ["application/", "image/", "text/"]
        .iter()
        .find_map(|prefix| mime_type.strip_prefix(prefix))
        .unwrap_or(mime_type)
        .to_string()
}

/// Binary human size; `-` when unknown or empty
pub fn nice_size(size: Option<u64>) -> String {
    match size {
        Some(bytes) if bytes > 0 => humansize::format_size(bytes, humansize::BINARY),
        _ => "-".to_string(),
    }
}

/// Time only when `modified` falls on `today` in `tz`, else date and time
pub fn nice_date(modified: Option<Timestamp>, today: Date, tz: &TimeZone) -> String {
    let Some(modified) = modified else {
        return "-".to_string();
    };
    let zoned = modified.to_zoned(tz.clone());
    if zoned.date() == today {
        zoned.strftime("%H:%M:%S").to_string()
    } else {
        zoned.strftime("%d-%b-%y %H:%M:%S").to_string()
    }
}

/// Table of entries with id, path, type, size and modified columns
pub fn entry_table(entries: &[Entry], today: Date, tz: &TimeZone) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_header(vec!["id", "path", "type", "size", "modified"]);
    for entry in entries {
        table.add_row(vec![
            entry.id.clone(),
            entry.path.clone(),
            short_type(&entry.mime_type),
            nice_size(entry.size),
            nice_date(entry.modified, today, tz),
        ]);
    }
    if let Some(column) = table.column_mut(3) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    table
}
