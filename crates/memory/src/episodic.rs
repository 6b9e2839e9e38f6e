//! Episodic memory — reflected-over past conversations.
//!
//! Write-heavy: every conversation end reflects over the transcript via
//! the completion capability and persists the structured result. Retrieval
//! is a relevance search with an access-tracking side effect: the top hit's
//! access counter and last-accessed timestamp are updated synchronously —
//! a read causes a write, and that coupling is part of the contract.

use chrono::{DateTime, Utc};
use engram_core::error::MemoryError;
use engram_core::memory::{EpisodicEntry, Reflection};
use engram_core::message::Message;
use engram_core::provider::Provider;
use engram_core::store::{Filter, SearchStore, StoredRecord};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::format_transcript;

const REFLECTION_PROMPT: &str = "You are analyzing conversations to create memories that will \
help guide future interactions. Your task is to extract key elements that would be most helpful \
when encountering similar discussions in the future.

Review the conversation and create a memory reflection following these rules:
1. For any field where you don't have enough information or the field isn't relevant, use \"N/A\"
2. Be extremely concise - each string should be one clear, actionable sentence
3. Focus only on information that would be useful for handling similar future conversations
4. Context_tags should be specific enough to match similar situations but general enough to be reusable

Output valid JSON in exactly this format:
{
    \"context_tags\": [string, string, ...],
    \"conversation_summary\": string,
    \"what_worked\": string,
    \"what_to_avoid\": string
}

Here is the prior conversation:

";

/// The episodic memory tier.
pub struct EpisodicMemory {
    store: Arc<dyn SearchStore>,
    provider: Arc<dyn Provider>,
    collection: String,
    alpha: f32,
}

impl EpisodicMemory {
    pub fn new(
        store: Arc<dyn SearchStore>,
        provider: Arc<dyn Provider>,
        collection: impl Into<String>,
        alpha: f32,
    ) -> Self {
        Self {
            store,
            provider,
            collection: collection.into(),
            alpha,
        }
    }

    /// Reflect over a finished conversation and persist the result along
    /// with the raw transcript. Returns the store-assigned id.
    ///
    /// Malformed-but-present reflection output never fails this operation
    /// (fields default independently); a completion-call error or a
    /// persistence error does.
    pub async fn store(&self, transcript: &[Message]) -> Result<String, MemoryError> {
        let conversation = format_transcript(transcript);
        let reflection = self.reflect_text(&conversation).await?;
        let entry = EpisodicEntry::from_reflection(conversation, reflection);

        let properties = entry_properties(&entry);
        let id = self
            .store
            .insert(&self.collection, properties)
            .await
            .map_err(|e| MemoryError::episodic("failed to persist entry", e))?;

        info!(id = %id, "Stored episodic memory");
        Ok(id)
    }

    /// Retrieve the most relevant past experience for a query.
    ///
    /// No match yields `Ok(None)`, not an error. A successful hit
    /// increments the entry's access counter and sets its last-accessed
    /// timestamp before returning.
    pub async fn retrieve(&self, query: &str) -> Result<Option<EpisodicEntry>, MemoryError> {
        let hits = self
            .store
            .hybrid_search(&self.collection, query, self.alpha, 1)
            .await
            .map_err(|e| MemoryError::episodic("retrieval query failed", e))?;

        let Some(record) = hits.into_iter().next() else {
            return Ok(None);
        };

        let mut entry = record_to_entry(&record);

        // Access-tracking side effect: read causes a write
        let access_count = entry.access_count + 1;
        let last_accessed = Utc::now();
        self.store
            .update_properties(
                &self.collection,
                &record.id,
                props(json!({
                    "access_count": access_count,
                    "last_accessed": last_accessed.to_rfc3339(),
                })),
            )
            .await
            .map_err(|e| MemoryError::episodic("access tracking failed", e))?;

        entry.access_count = access_count;
        entry.last_accessed = Some(last_accessed);
        Ok(Some(entry))
    }

    /// Entries matching any of the given tags (OR semantics). Order among
    /// equally-ranked matches is the store's default.
    pub async fn search_by_tags(
        &self,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<EpisodicEntry>, MemoryError> {
        if tags.is_empty() {
            return Ok(vec![]);
        }

        let filter = Filter::ContainsAny {
            path: "context_tags".into(),
            values: tags.to_vec(),
        };
        let records = self
            .store
            .fetch(&self.collection, Some(&filter), limit)
            .await
            .map_err(|e| MemoryError::episodic("tag search failed", e))?;

        Ok(records.iter().map(record_to_entry).collect())
    }

    /// Run the reflection step without persisting.
    pub async fn reflect(&self, transcript: &[Message]) -> Result<Reflection, MemoryError> {
        self.reflect_text(&format_transcript(transcript)).await
    }

    /// Delete all entries. Irreversible.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        self.store
            .delete_all(&self.collection)
            .await
            .map_err(|e| MemoryError::episodic("clear failed", e))?;
        info!("Cleared all episodic memories");
        Ok(())
    }

    /// Delete one entry by id.
    pub async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        self.store
            .delete(&self.collection, id)
            .await
            .map_err(|e| MemoryError::episodic(format!("delete {id} failed"), e))
    }

    /// Tier statistics (administrative, read-only).
    pub async fn stats(&self) -> Result<Value, MemoryError> {
        let total = self
            .store
            .count(&self.collection)
            .await
            .map_err(|e| MemoryError::episodic("stats count failed", e))?;
        Ok(json!({
            "total_memories": total,
            "collection": self.collection,
        }))
    }

    async fn reflect_text(&self, conversation: &str) -> Result<Reflection, MemoryError> {
        let prompt = format!("{REFLECTION_PROMPT}{conversation}");
        let raw = self
            .provider
            .complete_prompt(&prompt)
            .await
            .map_err(|e| MemoryError::episodic("reflection call failed", e))?;

        Ok(parse_reflection(&raw))
    }
}

/// Decode a reflection from model output, tolerating malformed shapes.
///
/// Each field defaults independently; surrounding prose or markdown code
/// fences are stripped by extracting the outermost JSON object. Entirely
/// unparseable output yields an all-default reflection.
fn parse_reflection(raw: &str) -> Reflection {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json_slice = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => {
            warn!("Reflection output contained no JSON object, using defaults");
            return Reflection::default();
        }
    };

    match serde_json::from_str::<Reflection>(json_slice) {
        Ok(reflection) => reflection,
        Err(e) => {
            warn!(error = %e, "Reflection JSON malformed, using defaults");
            Reflection::default()
        }
    }
}

fn entry_properties(entry: &EpisodicEntry) -> Map<String, Value> {
    props(json!({
        "conversation": entry.conversation,
        "context_tags": entry.context_tags,
        "conversation_summary": entry.conversation_summary,
        "what_worked": entry.what_worked,
        "what_to_avoid": entry.what_to_avoid,
        "created_at": entry.created_at.to_rfc3339(),
        "access_count": entry.access_count,
    }))
}

fn record_to_entry(record: &StoredRecord) -> EpisodicEntry {
    let created_at = parse_timestamp(&record.str_prop("created_at")).unwrap_or_else(Utc::now);
    let last_accessed = parse_timestamp(&record.str_prop("last_accessed"));

    EpisodicEntry {
        id: Some(record.id.clone()),
        conversation: record.str_prop("conversation"),
        context_tags: record.str_list_prop("context_tags"),
        conversation_summary: record.str_prop("conversation_summary"),
        what_worked: record.str_prop("what_worked"),
        what_to_avoid: record.str_prop("what_to_avoid"),
        created_at,
        last_accessed,
        access_count: record.u64_prop("access_count"),
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(text) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            debug!(error = %e, "Unparseable timestamp property");
            None
        }
    }
}

fn props(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_providers::ScriptedProvider;
    use engram_store::InMemoryStore;

    fn tier(reflection_json: &str) -> EpisodicMemory {
        EpisodicMemory::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(ScriptedProvider::always(reflection_json)),
            "episodic_memory",
            0.5,
        )
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::system("assembled context"),
            Message::user("how do lifetimes work?"),
            Message::assistant("they bound borrow validity"),
        ]
    }

    #[tokio::test]
    async fn store_persists_reflection_and_transcript() {
        let tier = tier(
            r#"{"context_tags": ["rust", "lifetimes"],
                "conversation_summary": "explained lifetimes",
                "what_worked": "concrete examples",
                "what_to_avoid": "N/A"}"#,
        );

        tier.store(&transcript()).await.unwrap();

        let entry = tier.retrieve("lifetimes").await.unwrap().unwrap();
        assert_eq!(entry.conversation_summary, "explained lifetimes");
        assert_eq!(entry.context_tags, vec!["rust", "lifetimes"]);
        assert!(entry.conversation.contains("USER: how do lifetimes work?"));
        assert!(!entry.conversation.contains("assembled context"));
    }

    #[tokio::test]
    async fn store_succeeds_with_missing_reflection_fields() {
        let tier = tier(r#"{"context_tags": ["rust"]}"#);
        tier.store(&transcript()).await.unwrap();

        let entry = tier.retrieve("lifetimes").await.unwrap().unwrap();
        assert_eq!(entry.what_worked, "");
        assert_eq!(entry.conversation_summary, "");
    }

    #[tokio::test]
    async fn store_succeeds_with_unparseable_reflection() {
        let tier = tier("I refuse to answer in JSON today.");
        tier.store(&transcript()).await.unwrap();

        let entry = tier.retrieve("lifetimes").await.unwrap().unwrap();
        assert!(entry.context_tags.is_empty());
        assert_eq!(entry.what_to_avoid, "");
    }

    #[tokio::test]
    async fn reflection_json_in_code_fence_is_extracted() {
        let reflection = parse_reflection(
            "Here you go:\n```json\n{\"conversation_summary\": \"short\"}\n```",
        );
        assert_eq!(reflection.conversation_summary, "short");
    }

    #[tokio::test]
    async fn retrieve_no_match_is_none_not_error() {
        let tier = tier(r#"{}"#);
        let result = tier.retrieve("anything").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn retrieving_twice_increments_access_count_by_two() {
        let tier = tier(r#"{"conversation_summary": "s"}"#);
        tier.store(&transcript()).await.unwrap();

        let first = tier.retrieve("lifetimes").await.unwrap().unwrap();
        let second = tier.retrieve("lifetimes").await.unwrap().unwrap();

        assert_eq!(first.access_count, 1);
        assert_eq!(second.access_count, 2);
        assert!(second.last_accessed.unwrap() >= first.last_accessed.unwrap());
    }

    #[tokio::test]
    async fn search_by_tags_matches_any() {
        let tier = tier(
            r#"{"context_tags": ["rust", "memory"], "conversation_summary": "s"}"#,
        );
        tier.store(&transcript()).await.unwrap();

        let hits = tier
            .search_by_tags(&["memory".into(), "unrelated".into()], 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let none = tier.search_by_tags(&["unrelated".into()], 5).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let tier = tier(r#"{"conversation_summary": "s"}"#);
        tier.store(&transcript()).await.unwrap();
        tier.clear().await.unwrap();
        assert!(tier.retrieve("lifetimes").await.unwrap().is_none());
    }
}
