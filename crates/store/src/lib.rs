//! Search store implementations for engram.

pub mod fusion;
pub mod in_memory;
pub mod sqlite;

pub use fusion::{alpha_fusion, cosine_similarity};
pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use serde_json::{Map, Value};

/// Derive the lexically searchable text of a record: the concatenation of
/// its string and string-array property values, in key order.
///
/// This mirrors how document stores index all text properties of an
/// object by default.
pub fn searchable_text(properties: &Map<String, Value>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for value in properties.values() {
        match value {
            Value::String(s) => parts.push(s),
            Value::Array(items) => {
                parts.extend(items.iter().filter_map(Value::as_str));
            }
            _ => {}
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn searchable_text_covers_strings_and_arrays() {
        let props = json!({
            "conversation": "USER: hi",
            "context_tags": ["greeting", "small_talk"],
            "access_count": 3,
        });
        let text = searchable_text(props.as_object().unwrap());
        assert!(text.contains("USER: hi"));
        assert!(text.contains("small_talk"));
        assert!(!text.contains('3'));
    }
}
