//! System-context assembly.
//!
//! Every turn gets a freshly assembled system message: base instructions,
//! then what episodic memory surfaced, then the current interaction
//! guidelines. Sections with nothing to say are omitted entirely rather
//! than rendered empty.

use engram_core::memory::{EpisodicEntry, Reflection};

const BASE_INSTRUCTIONS: &str = "You are a helpful AI assistant with layered memory of past \
conversations. Use the provided context to give consistent, personalized responses. Do not \
mention your memory systems unless the user asks about them.";

/// Assemble the system-context text for one turn.
pub fn assemble_system_context(episodic: Option<&EpisodicEntry>, procedural: &str) -> String {
    let mut parts = vec![BASE_INSTRUCTIONS.to_string()];

    if let Some(entry) = episodic {
        let mut section = vec!["=== SIMILAR PAST CONVERSATIONS ===".to_string()];
        if Reflection::is_informative(&entry.conversation_summary) {
            section.push(format!("Summary: {}", entry.conversation_summary));
        }
        if Reflection::is_informative(&entry.what_worked) {
            section.push(format!("What worked: {}", entry.what_worked));
        }
        if Reflection::is_informative(&entry.what_to_avoid) {
            section.push(format!("What to avoid: {}", entry.what_to_avoid));
        }
        if section.len() > 1 {
            parts.push(section.join("\n"));
        }
    }

    if !procedural.is_empty() {
        parts.push(format!("=== INTERACTION GUIDELINES ===\n{procedural}"));
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(summary: &str, worked: &str, avoid: &str) -> EpisodicEntry {
        EpisodicEntry::from_reflection(
            "USER: hi",
            Reflection {
                context_tags: vec![],
                conversation_summary: summary.into(),
                what_worked: worked.into(),
                what_to_avoid: avoid.into(),
            },
        )
    }

    #[test]
    fn context_with_no_memories_is_base_instructions_only() {
        let context = assemble_system_context(None, "");
        assert_eq!(context, BASE_INSTRUCTIONS);
    }

    #[test]
    fn episodic_section_lists_informative_fields() {
        let entry = entry("talked about rust", "examples", "N/A");
        let context = assemble_system_context(Some(&entry), "");

        assert!(context.contains("=== SIMILAR PAST CONVERSATIONS ==="));
        assert!(context.contains("Summary: talked about rust"));
        assert!(context.contains("What worked: examples"));
        assert!(!context.contains("What to avoid"));
    }

    #[test]
    fn episodic_section_omitted_when_all_fields_are_placeholders() {
        let entry = entry("N/A", "", "N/A");
        let context = assemble_system_context(Some(&entry), "");
        assert!(!context.contains("SIMILAR PAST CONVERSATIONS"));
    }

    #[test]
    fn guidelines_section_carries_rule_block() {
        let context = assemble_system_context(None, "1. Be brief - Saves time");
        assert!(context.ends_with("=== INTERACTION GUIDELINES ===\n1. Be brief - Saves time"));
    }
}
