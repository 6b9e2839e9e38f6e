//! Transient agent state — per-conversation accumulators.
//!
//! Lives for one conversation: reset to empty when a new one starts.
//! Accumulates the reflection fields surfaced during retrieval so that
//! end-of-conversation consolidation can fold them into procedural memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::message::SessionId;

/// Maximum episodic summaries retained in the history ring.
pub const EPISODIC_HISTORY_LIMIT: usize = 10;

/// Transient state of the agent within one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    // Session info
    pub session_id: SessionId,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    // Memory tracking
    /// Ring of recently surfaced episodic summaries (last 10, oldest dropped)
    pub episodic_history: Vec<String>,
    pub what_worked: BTreeSet<String>,
    pub what_to_avoid: BTreeSet<String>,
    pub current_context_tags: Vec<String>,

    // Counters
    pub total_messages: u64,
    pub error_count: u64,
}

impl AgentState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            start_time: now,
            last_activity: now,
            episodic_history: Vec::new(),
            what_worked: BTreeSet::new(),
            what_to_avoid: BTreeSet::new(),
            current_context_tags: Vec::new(),
            total_messages: 0,
            error_count: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Add a summary to the episodic-history ring, dropping the oldest
    /// beyond the limit.
    pub fn add_episodic(&mut self, summary: impl Into<String>) {
        self.episodic_history.push(summary.into());
        if self.episodic_history.len() > EPISODIC_HISTORY_LIMIT {
            let excess = self.episodic_history.len() - EPISODIC_HISTORY_LIMIT;
            self.episodic_history.drain(..excess);
        }
    }

    pub fn add_what_worked(&mut self, item: impl Into<String>) {
        self.what_worked.insert(item.into());
    }

    pub fn add_what_to_avoid(&mut self, item: impl Into<String>) {
        self.what_to_avoid.insert(item.into());
    }

    /// Reset accumulators for a new conversation. Keeps the session id;
    /// minting a new id is the session wrapper's job.
    pub fn reset(&mut self) {
        self.episodic_history.clear();
        self.what_worked.clear();
        self.what_to_avoid.clear();
        self.current_context_tags.clear();
        self.total_messages = 0;
        self.error_count = 0;
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episodic_history_is_bounded() {
        let mut state = AgentState::new();
        for i in 0..15 {
            state.add_episodic(format!("summary {i}"));
        }
        assert_eq!(state.episodic_history.len(), EPISODIC_HISTORY_LIMIT);
        assert_eq!(state.episodic_history[0], "summary 5");
        assert_eq!(state.episodic_history[9], "summary 14");
    }

    #[test]
    fn worked_and_avoid_sets_deduplicate() {
        let mut state = AgentState::new();
        state.add_what_worked("short answers");
        state.add_what_worked("short answers");
        assert_eq!(state.what_worked.len(), 1);
    }

    #[test]
    fn reset_clears_accumulators_and_keeps_session_id() {
        let mut state = AgentState::new();
        let id = state.session_id.clone();
        state.add_episodic("something");
        state.add_what_to_avoid("jargon");
        state.total_messages = 4;
        state.reset();
        assert!(state.episodic_history.is_empty());
        assert!(state.what_to_avoid.is_empty());
        assert_eq!(state.total_messages, 0);
        assert_eq!(state.session_id, id);
    }
}
