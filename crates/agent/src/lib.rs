//! Memory orchestration for engram.
//!
//! Wires the four memory tiers around a completion provider:
//!
//! - [`MemoryOrchestrator`] — shared, session-agnostic engine. Owns the
//!   long-term tiers (episodic, semantic, procedural) and the provider.
//! - [`SessionContext`] — per-session mutable state: working memory plus
//!   the transient accumulators. Owned by the caller, passed in by
//!   `&mut`, never shared between sessions.
//! - [`ConversationSession`] — lifecycle wrapper pairing one context with
//!   the shared orchestrator: start, process, end-with-summary, reset.

pub mod context;
pub mod orchestrator;
pub mod session;

pub use orchestrator::{MemoryOrchestrator, OrchestratorConfig, SessionContext};
pub use session::{ConversationSession, SessionSummary};
