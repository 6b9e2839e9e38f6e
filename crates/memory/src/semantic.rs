//! Semantic memory — factual knowledge chunks from ingested documents.
//!
//! Read-mostly: writes happen during ingestion, reads on every turn.
//! Retrieval formats hits into a labeled context block for prompt
//! assembly; structured search returns the chunks themselves.

use engram_core::error::MemoryError;
use engram_core::memory::SemanticChunk;
use engram_core::store::{Filter, SearchStore, StoredRecord};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// The semantic memory tier.
pub struct SemanticMemory {
    store: Arc<dyn SearchStore>,
    collection: String,
    alpha: f32,
    chunk_limit: usize,
}

impl SemanticMemory {
    pub fn new(
        store: Arc<dyn SearchStore>,
        collection: impl Into<String>,
        alpha: f32,
        chunk_limit: usize,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            alpha,
            chunk_limit: chunk_limit.max(1),
        }
    }

    /// Configured per-turn chunk limit.
    pub fn chunk_limit(&self) -> usize {
        self.chunk_limit
    }

    /// Relevant knowledge formatted as a context block, one labeled
    /// section per chunk. Empty string when nothing matches — callers
    /// treat that as "no knowledge available", never as an error.
    pub async fn retrieve(&self, query: &str) -> Result<String, MemoryError> {
        let chunks = self.search(query, self.chunk_limit).await?;

        let mut block = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            block.push_str(&format!("\nCHUNK {}:\n{}", i + 1, chunk.content));
        }
        Ok(block)
    }

    /// Structured relevance search over stored chunks.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SemanticChunk>, MemoryError> {
        let records = self
            .store
            .hybrid_search(&self.collection, query, self.alpha, limit)
            .await
            .map_err(|e| MemoryError::semantic("search failed", e))?;

        Ok(records.iter().map(record_to_chunk).collect())
    }

    /// All chunks from one source document, in original document order.
    pub async fn get_by_source(&self, source: &str) -> Result<Vec<SemanticChunk>, MemoryError> {
        let filter = Filter::Eq {
            path: "source".into(),
            value: source.to_string(),
        };
        let records = self
            .store
            .fetch(&self.collection, Some(&filter), usize::MAX)
            .await
            .map_err(|e| MemoryError::semantic("source fetch failed", e))?;

        let mut chunks: Vec<SemanticChunk> = records.iter().map(record_to_chunk).collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    /// Persist one chunk. Used by document ingestion.
    pub async fn store_chunk(&self, chunk: &SemanticChunk) -> Result<String, MemoryError> {
        let id = self
            .store
            .insert(&self.collection, chunk_properties(chunk))
            .await
            .map_err(|e| MemoryError::semantic("failed to persist chunk", e))?;
        Ok(id)
    }

    /// Delete all knowledge chunks. Irreversible.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        self.store
            .delete_all(&self.collection)
            .await
            .map_err(|e| MemoryError::semantic("clear failed", e))?;
        info!("Cleared all semantic memory");
        Ok(())
    }

    /// Delete one chunk by id.
    pub async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        self.store
            .delete(&self.collection, id)
            .await
            .map_err(|e| MemoryError::semantic(format!("delete {id} failed"), e))
    }

    /// Tier statistics: chunk total plus per-source distribution.
    pub async fn stats(&self) -> Result<Value, MemoryError> {
        let total = self
            .store
            .count(&self.collection)
            .await
            .map_err(|e| MemoryError::semantic("stats count failed", e))?;

        let records = self
            .store
            .fetch(&self.collection, None, usize::MAX)
            .await
            .map_err(|e| MemoryError::semantic("stats fetch failed", e))?;

        let mut sources: BTreeMap<String, u64> = BTreeMap::new();
        for record in &records {
            let source = record.str_prop("source");
            *sources.entry(source).or_default() += 1;
        }

        Ok(json!({
            "total_chunks": total,
            "sources": sources,
            "collection": self.collection,
        }))
    }
}

fn chunk_properties(chunk: &SemanticChunk) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("content".into(), json!(chunk.content));
    properties.insert("source".into(), json!(chunk.source));
    properties.insert("chunk_index".into(), json!(chunk.chunk_index));
    for (key, value) in &chunk.metadata {
        properties.insert(key.clone(), value.clone());
    }
    properties
}

fn record_to_chunk(record: &StoredRecord) -> SemanticChunk {
    let mut metadata = record.properties.clone();
    metadata.remove("content");
    metadata.remove("source");
    metadata.remove("chunk_index");

    SemanticChunk {
        id: Some(record.id.clone()),
        content: record.str_prop("content"),
        source: record.str_prop("source"),
        chunk_index: record.u64_prop("chunk_index") as usize,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_store::InMemoryStore;

    fn chunk(content: &str, source: &str, index: usize) -> SemanticChunk {
        SemanticChunk {
            id: None,
            content: content.into(),
            source: source.into(),
            chunk_index: index,
            metadata: Map::new(),
        }
    }

    async fn seeded() -> SemanticMemory {
        let tier = SemanticMemory::new(Arc::new(InMemoryStore::new()), "knowledge_base", 0.5, 15);
        tier.store_chunk(&chunk("ownership moves values", "book.md", 0))
            .await
            .unwrap();
        tier.store_chunk(&chunk("borrowing lends references", "book.md", 1))
            .await
            .unwrap();
        tier.store_chunk(&chunk("tokio schedules async tasks", "async.md", 0))
            .await
            .unwrap();
        tier
    }

    #[tokio::test]
    async fn retrieve_formats_labeled_chunks() {
        let tier = seeded().await;
        let block = tier.retrieve("borrowing references").await.unwrap();
        assert!(block.starts_with("\nCHUNK 1:\n"));
        assert!(block.contains("borrowing lends references"));
    }

    #[tokio::test]
    async fn retrieve_no_match_is_empty_string() {
        let tier = SemanticMemory::new(Arc::new(InMemoryStore::new()), "knowledge_base", 0.5, 15);
        let block = tier.retrieve("anything").await.unwrap();
        assert!(block.is_empty());
    }

    #[tokio::test]
    async fn get_by_source_returns_document_order() {
        // Inserted out of order so the result order cannot come from
        // the store's insertion order.
        let tier = SemanticMemory::new(Arc::new(InMemoryStore::new()), "knowledge_base", 0.5, 15);
        tier.store_chunk(&chunk("borrowing lends references", "book.md", 1))
            .await
            .unwrap();
        tier.store_chunk(&chunk("tokio schedules async tasks", "async.md", 0))
            .await
            .unwrap();
        tier.store_chunk(&chunk("ownership moves values", "book.md", 0))
            .await
            .unwrap();

        let chunks = tier.get_by_source("book.md").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].content, "ownership moves values");
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn stats_reports_source_distribution() {
        let tier = seeded().await;
        let stats = tier.stats().await.unwrap();
        assert_eq!(stats["total_chunks"], 3);
        assert_eq!(stats["sources"]["book.md"], 2);
        assert_eq!(stats["sources"]["async.md"], 1);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let tier = seeded().await;
        let chunks = tier.search("tokio", 5).await.unwrap();
        let id = chunks[0].id.clone().unwrap();
        assert!(tier.delete(&id).await.unwrap());
        assert!(!tier.delete(&id).await.unwrap());

        tier.clear().await.unwrap();
        assert_eq!(tier.stats().await.unwrap()["total_chunks"], 0);
    }
}
