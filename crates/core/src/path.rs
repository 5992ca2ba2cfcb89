//! Address parsing
//!
//! Handles the address forms accepted on the command line:
//! - `gd://` or `gd:root` for the store root
//! - `gd:<id>` for a direct id lookup
//! - `gd://seg1/seg2/...` for a segmented path (segments may hold `*` and `?`)
//! - `https://drive.google.com/drive/folders/<id>` and
//!   `https://drive.google.com/file/d/<id>/...` shared links

use url::Url;

use crate::error::{Error, Result};

/// Address scheme
pub const SCHEME: &str = "gd";

/// Prefix of every derived path; `gd://` alone is the root
pub const ROOT_MARKER: &str = "gd://";

/// Prefix of the direct id form
pub const ID_PREFIX: &str = "gd:";

/// Id the store accepts as an alias for its root folder
pub const ROOT_ID: &str = "root";

/// Host serving shared links
pub const LINK_HOST: &str = "drive.google.com";

const FOLDER_LINK_PREFIX: &str = "/drive/folders/";
const FILE_LINK_PREFIX: &str = "/file/d/";

/// The two shared-link shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    File,
    Folder,
}

/// A parsed address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `gd://`
    Root,
    /// `gd:<id>`, including `gd:root`
    Id(String),
    /// `gd://a/b/c`, never containing empty segments
    Path(Vec<String>),
    /// A shared link naming one file or folder
    Link { kind: LinkKind, id: String },
}

impl Address {
    /// The id named directly by this address, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Address::Id(id) | Address::Link { id, .. } => Some(id),
            Address::Root | Address::Path(_) => None,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Root => write!(f, "{ROOT_MARKER}"),
            Address::Id(id) => write!(f, "{ID_PREFIX}{id}"),
            Address::Path(segments) => write!(f, "{ROOT_MARKER}{}", segments.join("/")),
            Address::Link {
                kind: LinkKind::Folder,
                id,
            } => write!(f, "https://{LINK_HOST}{FOLDER_LINK_PREFIX}{id}"),
            Address::Link {
                kind: LinkKind::File,
                id,
            } => write!(f, "https://{LINK_HOST}{FILE_LINK_PREFIX}{id}"),
        }
    }
}

/// Parse an address string
///
/// Anything that matches none of the known prefixes, a path with empty
/// segments, and a link of unknown shape are all rejected with a 400-class
/// error.
pub fn parse_address(spec: &str) -> Result<Address> {
    if spec.is_empty() {
        return Err(Error::BadSpec("Address cannot be empty".into()));
    }

    if let Some(rest) = spec.strip_prefix(ROOT_MARKER) {
        if rest.is_empty() {
            return Ok(Address::Root);
        }
        return parse_segments(spec, rest);
    }

    if let Some(id) = spec.strip_prefix(ID_PREFIX) {
        if !is_valid_id(id) {
            return Err(Error::BadSpec(format!("Invalid id in {spec}")));
        }
        return Ok(Address::Id(id.to_string()));
    }

    if spec.starts_with("https://") || spec.starts_with("http://") {
        return parse_link(spec);
    }

    Err(Error::BadSpec(format!("Unrecognized address {spec}")))
}

fn parse_segments(spec: &str, rest: &str) -> Result<Address> {
    let segments: Vec<String> = rest.split('/').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        // catches a//b as well as a trailing slash
        return Err(Error::BadSpec(format!("Invalid filespec {spec}")));
    }
    Ok(Address::Path(segments))
}

fn parse_link(spec: &str) -> Result<Address> {
    let url = Url::parse(spec)?;
    if url.scheme() != "https" || url.host_str() != Some(LINK_HOST) {
        return Err(Error::BadSpec(format!("badly constructed link {spec}")));
    }

    let path = url.path();
    if let Some(id) = path.strip_prefix(FOLDER_LINK_PREFIX) {
        if is_valid_id(id) {
            return Ok(Address::Link {
                kind: LinkKind::Folder,
                id: id.to_string(),
            });
        }
    } else if let Some(rest) = path.strip_prefix(FILE_LINK_PREFIX) {
        // the id may be followed by a single action segment such as /view
        let mut parts = rest.splitn(2, '/');
        let id = parts.next().unwrap_or_default();
        let action_ok = parts.next().is_none_or(|action| !action.contains('/'));
        if is_valid_id(id) && action_ok {
            return Ok(Address::Link {
                kind: LinkKind::File,
                id: id.to_string(),
            });
        }
    }

    Err(Error::BadSpec(format!("badly constructed link {spec}")))
}

/// Ids are opaque, but never empty and never contain separators
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
