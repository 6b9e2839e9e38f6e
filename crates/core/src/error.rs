//! Error types for the engram domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each memory tier has
//! its own error variant so callers can tell which tier failed, and every
//! tier error keeps the underlying failure as a `#[source]` so the chain
//! survives re-wrapping at the tier boundary.

use thiserror::Error;

use crate::memory::MemoryTier;

/// The top-level error type for all engram operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion capability ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Relevance-search capability ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Memory tiers ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Session lifecycle ---
    #[error("Session error: {message}")]
    Session {
        message: String,
        #[source]
        source: Box<Error>,
    },

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Filesystem (procedural rules file, document ingestion) ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap any error into a session-level error, preserving the cause.
    pub fn session(message: impl Into<String>, source: Error) -> Self {
        Self::Session {
            message: message.into(),
            source: Box::new(source),
        }
    }
}

// --- Capability errors ---

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

/// A failure inside one of the four memory tiers.
///
/// Constructed by catching the failure at the tier boundary and re-wrapping
/// it with a tier-identifying message. The original error is retained as
/// the `source` rather than flattened into text.
#[derive(Debug, Error)]
#[error("{tier} memory: {message}")]
pub struct MemoryError {
    pub tier: MemoryTier,
    pub message: String,
    #[source]
    pub source: Option<Box<Error>>,
}

impl MemoryError {
    pub fn new(tier: MemoryTier, message: impl Into<String>) -> Self {
        Self {
            tier,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(tier: MemoryTier, message: impl Into<String>, source: Error) -> Self {
        Self {
            tier,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn working(message: impl Into<String>) -> Self {
        Self::new(MemoryTier::Working, message)
    }

    pub fn episodic(message: impl Into<String>, source: impl Into<Error>) -> Self {
        Self::with_source(MemoryTier::Episodic, message, source.into())
    }

    pub fn semantic(message: impl Into<String>, source: impl Into<Error>) -> Self {
        Self::with_source(MemoryTier::Semantic, message, source.into())
    }

    pub fn procedural(message: impl Into<String>, source: impl Into<Error>) -> Self {
        Self::with_source(MemoryTier::Procedural, message, source.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_error_displays_tier_and_message() {
        let err = Error::Memory(MemoryError::working("capacity underflow"));
        assert!(err.to_string().contains("working"));
        assert!(err.to_string().contains("capacity underflow"));
    }

    #[test]
    fn tier_error_preserves_cause_chain() {
        use std::error::Error as StdError;

        let cause = Error::Store(StoreError::QueryFailed("fts syntax".into()));
        let err = MemoryError::episodic("failed to retrieve", cause);
        let source = err.source().expect("source must be preserved");
        assert!(source.to_string().contains("fts syntax"));
    }

    #[test]
    fn session_error_wraps_original() {
        use std::error::Error as StdError;

        let inner = Error::Provider(ProviderError::Timeout("complete".into()));
        let err = Error::session("failed to process message", inner);
        assert!(err.to_string().contains("failed to process message"));
        assert!(err.source().unwrap().to_string().contains("complete"));
    }
}
