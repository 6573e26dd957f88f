//! Collection name normalization.
//!
//! Produces names legal on every supported backend: ASCII letters, digits, `_` and `-`
//! only, first character an ASCII letter, at most 63 characters. The timestamp suffix
//! always survives truncation.

use std::path::Path;

use chrono::NaiveDateTime;

pub const MAX_COLLECTION_NAME_LEN: usize = 63;

const PLACEHOLDER: &str = "doc";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const KNOWN_EXTENSIONS: &[&str] = &[
    "pdf", "txt", "md", "markdown", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "csv", "json",
    "html", "htm", "xml", "rtf", "epub",
];

/// Derive a collection name from a source filename, the embedding provider and a timestamp
pub fn collection_name(filename: &str, embedding_provider: &str, timestamp: NaiveDateTime) -> String {
    let mut stem = sanitize(strip_extension(base_name(filename)));
    if stem.is_empty() {
        stem = PLACEHOLDER.to_string();
    }
    if !stem.starts_with(|c: char| c.is_ascii_alphabetic()) {
        stem = format!("{}_{}", PLACEHOLDER, stem);
    }

    let provider = sanitize(embedding_provider);
    let mut prefix = if provider.is_empty() {
        stem
    } else {
        format!("{}_{}", stem, provider)
    };

    let suffix = format!("_{}", timestamp.format(TIMESTAMP_FORMAT));
    // sanitize() leaves only ASCII, so byte truncation stays on a char boundary
    prefix.truncate(MAX_COLLECTION_NAME_LEN - suffix.len());

    format!("{}{}", prefix, suffix)
}

/// Keep only `[A-Za-z0-9_-]`
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Whether `name` already satisfies the naming rules
pub fn is_legal(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME_LEN
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename)
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if KNOWN_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => stem,
        _ => name,
    }
}
