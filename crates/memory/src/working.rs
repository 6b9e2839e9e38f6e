//! Working memory — the bounded, ordered log of the active dialogue.
//!
//! The only memory tier that is pure in-process state. Capacity-bounded
//! with FIFO eviction regardless of role (system turns are not pinned).
//! Lifetime = one conversation session; the session owns its instance and
//! serializes access to it, so no internal locking is needed.

use engram_core::message::{Message, Role};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Default maximum number of messages retained.
pub const DEFAULT_CAPACITY: usize = 50;

/// Per-role message counters, maintained incrementally.
///
/// Invariant: always equals the true composition of the stored sequence,
/// after every mutation including eviction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCounts {
    pub total: usize,
    pub system: usize,
    pub user: usize,
    pub assistant: usize,
}

impl MessageCounts {
    fn add(&mut self, role: Role) {
        self.total += 1;
        match role {
            Role::System => self.system += 1,
            Role::User => self.user += 1,
            Role::Assistant => self.assistant += 1,
        }
    }

    fn remove(&mut self, role: Role) {
        self.total -= 1;
        match role {
            Role::System => self.system -= 1,
            Role::User => self.user -= 1,
            Role::Assistant => self.assistant -= 1,
        }
    }
}

/// A view filter for [`WorkingMemory::get`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFilter {
    /// Restrict to one role.
    pub role: Option<Role>,
    /// Keep only the last N of the (possibly role-filtered) sequence.
    pub limit: Option<usize>,
}

/// The bounded dialogue log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemory {
    messages: VecDeque<Message>,
    capacity: usize,
    counts: MessageCounts,
}

impl WorkingMemory {
    /// Create with the default capacity (50).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create with an explicit capacity. Capacity 0 is clamped to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity: capacity.max(1),
            counts: MessageCounts::default(),
        }
    }

    /// Append a message, evicting from the front if capacity is exceeded.
    /// Never fails.
    pub fn append(&mut self, message: Message) {
        self.counts.add(message.role);
        self.messages.push_back(message);

        while self.messages.len() > self.capacity {
            if let Some(evicted) = self.messages.pop_front() {
                self.counts.remove(evicted.role);
                debug!(role = %evicted.role, "Evicted oldest working-memory message");
            }
        }
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.append(Message::user(content));
    }

    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.append(Message::assistant(content));
    }

    pub fn append_system(&mut self, content: impl Into<String>) {
        self.append(Message::system(content));
    }

    /// Append retrieved semantic context as a distinguishable user-role
    /// turn (not a system turn).
    pub fn append_context(&mut self, content: &str) {
        self.append(Message::user(format!("[SEMANTIC CONTEXT]\n{content}")));
    }

    /// Return a filtered view: role filter first, then last-N limit.
    pub fn get(&self, filter: MessageFilter) -> Vec<Message> {
        let selected: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| filter.role.is_none_or(|role| m.role == role))
            .collect();

        let skip = filter
            .limit
            .map_or(0, |limit| selected.len().saturating_sub(limit));

        selected.into_iter().skip(skip).cloned().collect()
    }

    /// All messages in insertion order, optionally excluding system turns.
    pub fn messages(&self, exclude_system: bool) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !exclude_system || m.role != Role::System)
            .cloned()
            .collect()
    }

    /// Drop all messages and reset counters.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.counts = MessageCounts::default();
        debug!("Working memory cleared");
    }

    /// Remove the last `n` messages as if they were never stored.
    /// No-op when `n` is 0 or exceeds the current length.
    pub fn remove_last(&mut self, n: usize) {
        if n == 0 || n > self.messages.len() {
            return;
        }
        for _ in 0..n {
            if let Some(removed) = self.messages.pop_back() {
                self.counts.remove(removed.role);
            }
        }
    }

    /// Messages whose content contains the keyword (case-insensitive).
    pub fn search(&self, keyword: &str) -> Vec<Message> {
        let needle = keyword.to_lowercase();
        self.messages
            .iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// The most recent user turn, if any.
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// The most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn counts(&self) -> MessageCounts {
        self.counts
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tier statistics (administrative, read-only).
    pub fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "total_messages": self.counts.total,
            "system_messages": self.counts.system,
            "user_messages": self.counts.user,
            "assistant_messages": self.counts.assistant,
            "current_size": self.messages.len(),
            "capacity": self.capacity,
            "utilization": self.messages.len() as f64 / self.capacity as f64,
        })
    }
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}
