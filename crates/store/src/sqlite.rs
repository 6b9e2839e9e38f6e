//! SQLite store with FTS5 full-text search and stored-embedding vectors.
//!
//! Uses a single SQLite database file with two tables:
//! - `records` — the raw records, one row per stored object
//! - `records_fts` — FTS5 virtual table for ranked keyword search (BM25)
//!
//! Triggers keep the FTS index in sync on insert/delete/update. Hybrid
//! search blends the BM25 ranking with cosine similarity over embeddings
//! generated at insert time (when an embedder is attached).

use async_trait::async_trait;
use chrono::Utc;
use engram_core::error::{ProviderError, StoreError};
use engram_core::provider::Provider;
use engram_core::store::{Filter, SearchStore, StoredRecord};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::fusion::{alpha_fusion, cosine_similarity};
use crate::searchable_text;

/// A SQLite-backed search store with hybrid relevance.
pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Option<Arc<dyn Provider>>,
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool, embedder: None };
        store.run_migrations().await?;
        info!("SQLite search store initialized at {path}");
        Ok(store)
    }

    /// Attach an embedder used for the vector component of hybrid search.
    ///
    /// Without one, hybrid search degrades to keyword-only ranking.
    pub fn with_embedder(mut self, embedder: Arc<dyn Provider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Run schema migrations — creates tables, FTS5 virtual table, and triggers.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        // Main records table with integer rowid alias for FTS5 sync
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT UNIQUE NOT NULL,
                collection  TEXT NOT NULL,
                properties  TEXT NOT NULL DEFAULT '{}',
                searchable  TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL,
                embedding   BLOB
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("records table: {e}")))?;

        // External-content FTS5 table synced via triggers
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS records_fts USING fts5(
                searchable,
                content='records',
                content_rowid='iid',
                tokenize='porter unicode61'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("FTS5 table: {e}")))?;

        // Trigger: sync FTS on INSERT
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS records_ai AFTER INSERT ON records BEGIN
                INSERT INTO records_fts(rowid, searchable)
                VALUES (new.iid, new.searchable);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("insert trigger: {e}")))?;

        // Trigger: sync FTS on DELETE (external-content delete command)
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS records_ad AFTER DELETE ON records BEGIN
                INSERT INTO records_fts(records_fts, rowid, searchable)
                VALUES ('delete', old.iid, old.searchable);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("delete trigger: {e}")))?;

        // Trigger: sync FTS on UPDATE (delete old, insert new)
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS records_au AFTER UPDATE ON records BEGIN
                INSERT INTO records_fts(records_fts, rowid, searchable)
                VALUES ('delete', old.iid, old.searchable);
                INSERT INTO records_fts(rowid, searchable)
                VALUES (new.iid, new.searchable);
            END
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("update trigger: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("collection index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `StoredRecord` from a SQLite row.
    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<StoredRecord, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let properties_json: String = row
            .try_get("properties")
            .map_err(|e| StoreError::QueryFailed(format!("properties column: {e}")))?;
        let properties: Map<String, Value> = serde_json::from_str(&properties_json)
            .map_err(|e| StoreError::QueryFailed(format!("properties JSON: {e}")))?;

        Ok(StoredRecord { id, properties, score: 0.0 })
    }

    /// Read the embedding blob of a row, if present.
    fn row_embedding(row: &sqlx::sqlite::SqliteRow) -> Option<Vec<f32>> {
        let blob: Option<Vec<u8>> = row.try_get("embedding").ok()?;
        blob.map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect()
        })
    }

    /// Serialize an embedding vector to bytes.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Build a safe FTS5 query from user text.
    ///
    /// Tokenizes the input into words and joins them with OR, quoting each
    /// token to prevent FTS syntax injection.
    fn sanitize_fts_query(text: &str) -> String {
        text.split_whitespace()
            .map(|w| {
                let clean: String = w
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if clean.is_empty() {
                    return String::new();
                }
                format!("\"{clean}\"*")
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Embed a single text, treating "embeddings not configured" as absence
    /// rather than failure.
    async fn try_embed(&self, text: &str) -> Result<Option<Vec<f32>>, StoreError> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };
        match embedder.embed(&[text.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => Ok(Some(vectors.remove(0))),
            Ok(_) => Ok(None),
            Err(ProviderError::NotConfigured(_)) => Ok(None),
            Err(e) => Err(StoreError::EmbeddingFailed(e.to_string())),
        }
    }

    /// FTS5 keyword search scoped to one collection.
    async fn keyword_search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let fts_query = Self::sanitize_fts_query(query);
        if fts_query.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT r.*, bm25(records_fts) AS rank
            FROM records_fts f
            JOIN records r ON r.iid = f.rowid
            WHERE records_fts MATCH ?1 AND r.collection = ?2
            ORDER BY rank
            LIMIT ?3
            "#,
        )
        .bind(&fts_query)
        .bind(collection)
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("FTS5 search: {e}")))?;

        rows.iter()
            .map(|row| {
                let mut record = Self::row_to_record(row)?;
                // bm25() returns negative values (lower = better match);
                // flip so higher = better
                let rank: f64 = row.try_get("rank").unwrap_or(0.0);
                record.score = (-rank) as f32;
                Ok(record)
            })
            .collect()
    }

    /// Rank a collection's embedded records by cosine similarity.
    async fn vector_search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM records WHERE collection = ?1 AND embedding IS NOT NULL",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Vector scan: {e}")))?;

        let mut scored: Vec<StoredRecord> = rows
            .iter()
            .filter_map(|row| {
                let embedding = Self::row_embedding(row)?;
                let mut record = Self::row_to_record(row).ok()?;
                record.score = cosine_similarity(&embedding, query_embedding);
                Some(record)
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[async_trait]
impl SearchStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(
        &self,
        collection: &str,
        properties: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let searchable = searchable_text(&properties);
        let properties_json = serde_json::to_string(&properties)
            .map_err(|e| StoreError::Storage(format!("properties serialization: {e}")))?;
        let embedding_blob = self
            .try_embed(&searchable)
            .await?
            .map(|v| Self::embedding_to_blob(&v));

        sqlx::query(
            r#"
            INSERT INTO records (id, collection, properties, searchable, created_at, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(collection)
        .bind(&properties_json)
        .bind(&searchable)
        .bind(Utc::now().to_rfc3339())
        .bind(embedding_blob.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        debug!(collection, id = %id, "Stored record");
        Ok(id)
    }

    async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        alpha: f32,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        // Over-fetch both components so fusion has enough candidates
        let fetch = limit.saturating_mul(2);
        let keyword_results = self.keyword_search(collection, query, fetch).await?;

        let Some(query_embedding) = self.try_embed(query).await? else {
            debug!(collection, "Hybrid search: no embedder, keyword-only results");
            let mut results = keyword_results;
            results.truncate(limit);
            return Ok(results);
        };

        let vector_results = self
            .vector_search(collection, &query_embedding, fetch)
            .await?;

        if vector_results.is_empty() {
            let mut results = keyword_results;
            results.truncate(limit);
            return Ok(results);
        }

        Ok(alpha_fusion(&keyword_results, &vector_results, alpha, limit))
    }

    async fn fetch(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM records WHERE collection = ?1 ORDER BY created_at ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("fetch: {e}")))?;

        let mut results = Vec::new();
        for row in &rows {
            let record = Self::row_to_record(row)?;
            if filter.is_none_or(|f| f.matches(&record.properties)) {
                results.push(record);
                if results.len() >= limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    async fn update_properties(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let row = sqlx::query("SELECT properties FROM records WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("update lookup: {e}")))?
            .ok_or_else(|| StoreError::RecordNotFound(id.into()))?;

        let properties_json: String = row
            .try_get("properties")
            .map_err(|e| StoreError::QueryFailed(format!("properties column: {e}")))?;
        let mut properties: Map<String, Value> = serde_json::from_str(&properties_json)
            .map_err(|e| StoreError::QueryFailed(format!("properties JSON: {e}")))?;

        for (key, value) in patch {
            properties.insert(key, value);
        }

        let searchable = searchable_text(&properties);
        let updated = serde_json::to_string(&properties)
            .map_err(|e| StoreError::Storage(format!("properties serialization: {e}")))?;

        sqlx::query("UPDATE records SET properties = ?1, searchable = ?2 WHERE id = ?3")
            .bind(&updated)
            .bind(&searchable)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE failed: {e}")))?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, collection: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM records WHERE collection = ?1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE ALL failed: {e}")))?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM records WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("count: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| StoreError::QueryFailed(format!("count column: {e}")))?;
        Ok(n as usize)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}
