//! # Engram Core
//!
//! Domain types, traits, and error definitions for the engram tiered-memory
//! agent. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two external capabilities the memory engine consumes — text
//! completion and relevance search — are defined as traits here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/in-memory implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod memory;
pub mod provider;
pub mod state;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, Result, StoreError};
pub use memory::{EpisodicEntry, MemoryTier, ProceduralRule, Reflection, SemanticChunk};
pub use message::{Message, Role, SessionId};
pub use provider::Provider;
pub use state::AgentState;
pub use store::{Filter, SearchStore, StoredRecord};
