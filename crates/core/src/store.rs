//! SearchStore trait — the abstraction over the relevance-search capability.
//!
//! Collections of JSON-property records with hybrid (lexical + vector)
//! search. The long-term memory tiers borrow one shared store handle owned
//! by the orchestrator; they never close it themselves.

use async_trait::async_trait;
use serde_json::{Map, Value};
use crate::error::StoreError;

/// A record returned by a store query.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// Opaque store-assigned id
    pub id: String,

    /// The record's properties
    pub properties: Map<String, Value>,

    /// Relevance score (0 for filter fetches)
    pub score: f32,
}

impl StoredRecord {
    /// Read a string property, empty if absent or not a string.
    pub fn str_prop(&self, key: &str) -> String {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Read a string-array property, empty if absent.
    pub fn str_list_prop(&self, key: &str) -> Vec<String> {
        self.properties
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Read a non-negative integer property, 0 if absent.
    pub fn u64_prop(&self, key: &str) -> u64 {
        self.properties.get(key).and_then(Value::as_u64).unwrap_or(0)
    }
}

/// A property filter for non-relevance fetches.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Property equals the given string value.
    Eq { path: String, value: String },

    /// String-array property contains any of the given values.
    ContainsAny { path: String, values: Vec<String> },

    /// Any sub-filter matches.
    Or(Vec<Filter>),
}

impl Filter {
    /// Evaluate this filter against a property map.
    pub fn matches(&self, properties: &Map<String, Value>) -> bool {
        match self {
            Filter::Eq { path, value } => properties
                .get(path)
                .and_then(Value::as_str)
                .is_some_and(|v| v == value),
            Filter::ContainsAny { path, values } => properties
                .get(path)
                .and_then(Value::as_array)
                .is_some_and(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|item| values.iter().any(|v| v == item))
                }),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(properties)),
        }
    }
}

/// The relevance-search capability.
///
/// Implementations: SQLite (FTS5 keyword + stored-embedding vector hybrid),
/// in-memory (tests and ephemeral runs).
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert a record; returns the store-assigned id.
    async fn insert(
        &self,
        collection: &str,
        properties: Map<String, Value>,
    ) -> std::result::Result<String, StoreError>;

    /// Hybrid lexical+vector relevance search.
    ///
    /// `alpha` blends the two signals: 0.0 = pure lexical, 1.0 = pure
    /// vector. Results are ordered by descending blended score.
    async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        alpha: f32,
        limit: usize,
    ) -> std::result::Result<Vec<StoredRecord>, StoreError>;

    /// Fetch records by filter (no relevance ranking).
    async fn fetch(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> std::result::Result<Vec<StoredRecord>, StoreError>;

    /// Merge the given properties into an existing record.
    async fn update_properties(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> std::result::Result<(), StoreError>;

    /// Delete a record by id. Returns true if it existed.
    async fn delete(&self, collection: &str, id: &str)
        -> std::result::Result<bool, StoreError>;

    /// Delete every record in a collection.
    async fn delete_all(&self, collection: &str) -> std::result::Result<(), StoreError>;

    /// Count records in a collection.
    async fn count(&self, collection: &str) -> std::result::Result<usize, StoreError>;

    /// Release the underlying connection. Called once at shutdown by the
    /// handle's owner; borrowers never call this.
    async fn close(&self) -> std::result::Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn eq_filter_matches_string_property() {
        let p = props(json!({"source": "doc.pdf", "chunk_index": 3}));
        let f = Filter::Eq { path: "source".into(), value: "doc.pdf".into() };
        assert!(f.matches(&p));

        let f = Filter::Eq { path: "source".into(), value: "other.pdf".into() };
        assert!(!f.matches(&p));
    }

    #[test]
    fn contains_any_matches_tag_arrays() {
        let p = props(json!({"context_tags": ["rust", "memory"]}));
        let f = Filter::ContainsAny {
            path: "context_tags".into(),
            values: vec!["memory".into(), "python".into()],
        };
        assert!(f.matches(&p));

        let f = Filter::ContainsAny {
            path: "context_tags".into(),
            values: vec!["python".into()],
        };
        assert!(!f.matches(&p));
    }

    #[test]
    fn or_filter_composes() {
        let p = props(json!({"source": "a.md"}));
        let f = Filter::Or(vec![
            Filter::Eq { path: "source".into(), value: "b.md".into() },
            Filter::Eq { path: "source".into(), value: "a.md".into() },
        ]);
        assert!(f.matches(&p));
    }

    #[test]
    fn record_prop_accessors_default_gracefully() {
        let record = StoredRecord {
            id: "r1".into(),
            properties: props(json!({"summary": "short", "access_count": 2})),
            score: 0.5,
        };
        assert_eq!(record.str_prop("summary"), "short");
        assert_eq!(record.str_prop("missing"), "");
        assert_eq!(record.u64_prop("access_count"), 2);
        assert!(record.str_list_prop("tags").is_empty());
    }
}
