//! In-memory store — useful for testing and ephemeral sessions.
//!
//! Keyword-only relevance (no embeddings); the `alpha` blend factor is
//! accepted but the vector component is always empty.

use async_trait::async_trait;
use engram_core::error::StoreError;
use engram_core::store::{Filter, SearchStore, StoredRecord};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::searchable_text;

#[derive(Clone)]
struct Row {
    id: String,
    properties: Map<String, Value>,
    searchable: String,
}

/// An in-memory store keeping each collection as a Vec of rows.
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Row>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert(
        &self,
        collection: &str,
        properties: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let row = Row {
            id: id.clone(),
            searchable: searchable_text(&properties),
            properties,
        };
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(row);
        Ok(id)
    }

    async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        _alpha: f32,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self.collections.read().await;
        let Some(rows) = collections.get(collection) else {
            return Ok(vec![]);
        };

        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let mut results: Vec<StoredRecord> = rows
            .iter()
            .filter_map(|row| {
                let haystack = row.searchable.to_lowercase();
                // Simple keyword relevance: term occurrences per 100 chars
                let occurrences: usize =
                    terms.iter().map(|t| haystack.matches(t.as_str()).count()).sum();
                if occurrences == 0 {
                    return None;
                }
                let score = occurrences as f32 / (haystack.len() as f32 / 100.0).max(1.0);
                Some(StoredRecord {
                    id: row.id.clone(),
                    properties: row.properties.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }

    async fn fetch(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self.collections.read().await;
        let Some(rows) = collections.get(collection) else {
            return Ok(vec![]);
        };

        Ok(rows
            .iter()
            .filter(|row| filter.is_none_or(|f| f.matches(&row.properties)))
            .take(limit)
            .map(|row| StoredRecord {
                id: row.id.clone(),
                properties: row.properties.clone(),
                score: 0.0,
            })
            .collect())
    }

    async fn update_properties(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let rows = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.into()))?;
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| StoreError::RecordNotFound(id.into()))?;

        for (key, value) in patch {
            row.properties.insert(key, value);
        }
        row.searchable = searchable_text(&row.properties);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }

    async fn delete_all(&self, collection: &str) -> Result<(), StoreError> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len))
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn insert_and_search_by_keyword() {
        let store = InMemoryStore::new();
        store
            .insert("notes", props(json!({"content": "rust borrow checker"})))
            .await
            .unwrap();
        store
            .insert("notes", props(json!({"content": "python interpreter"})))
            .await
            .unwrap();

        let hits = store.hybrid_search("notes", "borrow", 0.5, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].str_prop("content"), "rust borrow checker");
    }

    #[tokio::test]
    async fn search_unknown_collection_is_empty_not_error() {
        let store = InMemoryStore::new();
        let hits = store.hybrid_search("missing", "anything", 0.5, 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn fetch_applies_filter() {
        let store = InMemoryStore::new();
        store
            .insert("chunks", props(json!({"source": "a.md", "chunk_index": 0})))
            .await
            .unwrap();
        store
            .insert("chunks", props(json!({"source": "b.md", "chunk_index": 0})))
            .await
            .unwrap();

        let filter = Filter::Eq { path: "source".into(), value: "a.md".into() };
        let rows = store.fetch("chunks", Some(&filter), 100).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].str_prop("source"), "a.md");
    }

    #[tokio::test]
    async fn update_merges_properties_and_reindexes() {
        let store = InMemoryStore::new();
        let id = store
            .insert("notes", props(json!({"content": "original", "access_count": 0})))
            .await
            .unwrap();

        store
            .update_properties("notes", &id, props(json!({"access_count": 1})))
            .await
            .unwrap();

        let rows = store.fetch("notes", None, 10).await.unwrap();
        assert_eq!(rows[0].u64_prop("access_count"), 1);
        assert_eq!(rows[0].str_prop("content"), "original");
    }

    #[tokio::test]
    async fn update_missing_record_errors() {
        let store = InMemoryStore::new();
        store.insert("notes", Map::new()).await.unwrap();
        let err = store
            .update_properties("notes", "nope", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn delete_all_empties_collection() {
        let store = InMemoryStore::new();
        store.insert("notes", Map::new()).await.unwrap();
        store.insert("notes", Map::new()).await.unwrap();
        assert_eq!(store.count("notes").await.unwrap(), 2);

        store.delete_all("notes").await.unwrap();
        assert_eq!(store.count("notes").await.unwrap(), 0);
    }
}
