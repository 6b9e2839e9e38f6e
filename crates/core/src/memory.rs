//! Memory tier domain models.
//!
//! Value objects for the three long-term tiers:
//! - `EpisodicEntry` — one reflected-over past conversation
//! - `SemanticChunk` — one piece of ingested document knowledge
//! - `ProceduralRule` — one behavioral rule in the curated rule set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel used when a reflection field is judged inapplicable.
/// Reflection fields are always present — never absent or null.
pub const NOT_APPLICABLE: &str = "N/A";

/// The four memory tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    Working,
    Episodic,
    Semantic,
    Procedural,
}

impl MemoryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::Working => "working",
            MemoryTier::Episodic => "episodic",
            MemoryTier::Semantic => "semantic",
            MemoryTier::Procedural => "procedural",
        }
    }
}

impl std::fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "working" => Ok(MemoryTier::Working),
            "episodic" => Ok(MemoryTier::Episodic),
            "semantic" => Ok(MemoryTier::Semantic),
            "procedural" => Ok(MemoryTier::Procedural),
            other => Err(format!("unknown memory tier: {other}")),
        }
    }
}

/// The structured output of reflecting over a finished conversation.
///
/// Produced by the completion capability from a fixed reflection
/// instruction. Each field defaults independently when the model omits or
/// malformed it — the raw shape is never trusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reflection {
    #[serde(default)]
    pub context_tags: Vec<String>,

    #[serde(default)]
    pub conversation_summary: String,

    #[serde(default)]
    pub what_worked: String,

    #[serde(default)]
    pub what_to_avoid: String,
}

impl Reflection {
    /// True if a reflection field carries real content (non-empty, not the
    /// "N/A" sentinel).
    pub fn is_informative(field: &str) -> bool {
        !field.is_empty() && field != NOT_APPLICABLE
    }
}

/// A stored past-conversation experience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicEntry {
    /// Opaque id assigned by the store on persist
    #[serde(default)]
    pub id: Option<String>,

    /// Full conversation transcript (system turns excluded)
    pub conversation: String,

    /// Context tags for situational matching
    #[serde(default)]
    pub context_tags: Vec<String>,

    /// One-sentence summary of the conversation
    #[serde(default)]
    pub conversation_summary: String,

    /// One sentence on what worked
    #[serde(default)]
    pub what_worked: String,

    /// One sentence on what to avoid
    #[serde(default)]
    pub what_to_avoid: String,

    pub created_at: DateTime<Utc>,

    /// Updated on every successful retrieval
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,

    /// Incremented on every successful retrieval
    #[serde(default)]
    pub access_count: u64,
}

impl EpisodicEntry {
    /// Build an entry from a transcript and its reflection.
    pub fn from_reflection(conversation: impl Into<String>, reflection: Reflection) -> Self {
        Self {
            id: None,
            conversation: conversation.into(),
            context_tags: reflection.context_tags,
            conversation_summary: reflection.conversation_summary,
            what_worked: reflection.what_worked,
            what_to_avoid: reflection.what_to_avoid,
            created_at: Utc::now(),
            last_accessed: None,
            access_count: 0,
        }
    }
}

/// A chunk of ingested document knowledge. Read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticChunk {
    /// Opaque id assigned by the store on persist
    #[serde(default)]
    pub id: Option<String>,

    /// The chunk text
    pub content: String,

    /// Originating document label
    pub source: String,

    /// Zero-based position of this chunk within its source
    pub chunk_index: usize,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// One rule in the procedural rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProceduralRule {
    /// 1-based index, contiguous, re-assigned on any removal
    pub index: usize,

    pub instruction: String,

    pub rationale: String,

    #[serde(default)]
    pub category: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ProceduralRule {
    pub fn new(index: usize, instruction: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            index,
            instruction: instruction.into(),
            rationale: rationale.into(),
            category: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_round_trips_through_str() {
        for tier in [
            MemoryTier::Working,
            MemoryTier::Episodic,
            MemoryTier::Semantic,
            MemoryTier::Procedural,
        ] {
            let parsed: MemoryTier = tier.as_str().parse().unwrap();
            assert_eq!(parsed, tier);
        }
        assert!("muscle".parse::<MemoryTier>().is_err());
    }

    #[test]
    fn reflection_decodes_with_missing_fields() {
        let reflection: Reflection = serde_json::from_str(r#"{"context_tags": ["rust"]}"#).unwrap();
        assert_eq!(reflection.context_tags, vec!["rust"]);
        assert_eq!(reflection.conversation_summary, "");
        assert_eq!(reflection.what_worked, "");
    }

    #[test]
    fn sentinel_is_not_informative() {
        assert!(!Reflection::is_informative("N/A"));
        assert!(!Reflection::is_informative(""));
        assert!(Reflection::is_informative("kept answers short"));
    }

    #[test]
    fn entry_from_reflection_starts_unaccessed() {
        let entry = EpisodicEntry::from_reflection("USER: hi", Reflection::default());
        assert_eq!(entry.access_count, 0);
        assert!(entry.last_accessed.is_none());
        assert!(entry.id.is_none());
    }
}
