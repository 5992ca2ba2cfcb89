//! Drive search query construction
//!
//! The files API filters with a small query language (`q`). It can match an
//! exact name but not a glob, so wildcard patterns never reach this module;
//! the core filters those client side.

use gd_core::traits::{FOLDER_MIME_TYPE, MIN_FIELDS};
use gd_core::ListRequest;

/// Quote a value for use inside a `q` string literal
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Build the `q` expression for a children listing
///
/// Trashed entries are always excluded.
pub fn build_query(request: &ListRequest) -> String {
    let mut clauses = Vec::new();

    if let Some(name) = &request.name {
        clauses.push(format!("name = {}", quote(name)));
    }

    let parents: Vec<String> = request
        .parent_ids
        .iter()
        .map(|id| format!("{} in parents", quote(id)))
        .collect();
    match parents.len() {
        0 => {}
        1 => clauses.extend(parents),
        _ => clauses.push(format!("({})", parents.join(" or "))),
    }

    if request.folders_only {
        clauses.push(format!("mimeType = {}", quote(FOLDER_MIME_TYPE)));
    }

    clauses.push("trashed = false".to_string());
    clauses.join(" and ")
}

/// Per-file fields: the minimum set plus any extras, without duplicates
pub fn file_fields(extra: &[&str]) -> String {
    let mut fields: Vec<&str> = MIN_FIELDS.split(',').collect();
    for field in extra.iter().flat_map(|f| f.split(',')).map(str::trim) {
        if !field.is_empty() && !fields.contains(&field) {
            fields.push(field);
        }
    }
    fields.join(",")
}

/// The `fields` parameter for a listing response
pub fn list_fields(extra: &[&str]) -> String {
    format!("nextPageToken,files({})", file_fields(extra))
}

/// Query parameters for one listing page
pub fn list_params(request: &ListRequest, extra_fields: &[&str]) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", build_query(request)),
        ("fields", list_fields(extra_fields)),
    ];
    if request.page_size > 0 {
        params.push(("pageSize", request.page_size.to_string()));
    }
    if let Some(token) = &request.page_token {
        params.push(("pageToken", token.clone()));
    }
    if let Some(order_by) = &request.order_by {
        params.push(("orderBy", order_by.clone()));
    }
    params
}
