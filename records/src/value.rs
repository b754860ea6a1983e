//!
//! Dynamic values flowing from the engine through resolvers into handlers.
//!

pub use serde_json::Value;

/// Name -> value mapping of one row, as seen by resolvers and handlers.
/// Keys keep insertion order, so a fetched row follows the projection.
pub type Mapping = serde_json::Map<String, Value>;

/// Render a value the way string concatenation sees it.
/// `None` means SQL `NULL`, which concatenation skips.
pub fn concat_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(string) => Some(string.clone()),
        other => Some(other.to_string()),
    }
}
