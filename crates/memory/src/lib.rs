//! Memory tier implementations for engram.
//!
//! Four tiers with distinct lifecycles:
//! - [`WorkingMemory`] — bounded in-process log of the active dialogue
//! - [`EpisodicMemory`] — reflected-over past conversations, relevance-searched
//! - [`SemanticMemory`] — ingested document knowledge, relevance-searched
//! - [`ProceduralMemory`] — small LLM-curated rule set, file-persisted

pub mod episodic;
pub mod procedural;
pub mod semantic;
pub mod working;

pub use episodic::EpisodicMemory;
pub use procedural::{MAX_RULES, ProceduralMemory};
pub use semantic::SemanticMemory;
pub use working::{MessageCounts, WorkingMemory};

use engram_core::message::{Message, Role};

/// Format a dialogue as a "ROLE: content" transcript, one line per turn,
/// system turns excluded.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_excludes_system_turns() {
        let messages = vec![
            Message::system("context block"),
            Message::user("hello"),
            Message::assistant("hi there"),
        ];
        let transcript = format_transcript(&messages);
        assert_eq!(transcript, "USER: hello\nASSISTANT: hi there");
    }

    #[test]
    fn empty_dialogue_formats_to_empty_string() {
        assert_eq!(format_transcript(&[]), "");
    }
}
