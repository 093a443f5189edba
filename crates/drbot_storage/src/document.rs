//! Document encoding.
//!
//! A document is a `//` banner line, a blank line, then a JSON object.

use drbot_error::{StorageError, StorageErrorKind, StorageResult};
use serde_json::{Map, Value};

/// Render a namespace as document text.
pub fn render_document(banner: &str, data: &Map<String, Value>) -> StorageResult<String> {
    let json = serde_json::to_string(data)
        .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;
    Ok(format!("// {}\n\n{}", banner, json))
}

/// Parse document text into a namespace, skipping the leading `//` banner.
///
/// Only comment and blank lines before the JSON body are skipped. Empty
/// documents are empty namespaces.
///
/// # Examples
///
/// ```
/// use drbot_storage::parse_document;
///
/// let data = parse_document("// banner\n\n{\"k\": 1}").unwrap();
/// assert_eq!(data["k"], 1);
/// assert!(parse_document("   ").unwrap().is_empty());
/// ```
pub fn parse_document(content: &str) -> StorageResult<Map<String, Value>> {
    let mut body = content;
    while let Some(line) = body.lines().next() {
        let trimmed = line.trim_start();
        if !trimmed.is_empty() && !trimmed.starts_with("//") {
            break;
        }
        body = body
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or_default();
    }
    if body.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(body)
        .map_err(|e| StorageError::new(StorageErrorKind::Deserialization(e.to_string())))
}
