//! Procedural memory — the behavioral rule set.
//!
//! A small, bounded list of "instruction - rationale" rules persisted as
//! a plain numbered text file so operators can read and hand-edit it.
//! Updates are LLM-refined and deliberately conservative: output that
//! yields no well-formed rules leaves the current set untouched.

use chrono::{DateTime, Utc};
use engram_core::error::MemoryError;
use engram_core::memory::ProceduralRule;
use engram_core::provider::Provider;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Upper bound on stored rules. Refinement output beyond this is truncated.
pub const MAX_RULES: usize = 10;

const DEFAULT_RULES: &[&str] = &[
    "Maintain conversation context by recalling previous interactions - Builds rapport and shows attention to user preferences over time.",
    "Use clear and concise language to convey information - Enhances understanding and avoids confusion.",
    "Offer structured breakdowns for complex topics - Facilitates comprehension and highlights key roles and functions.",
    "Ask clarifying questions when user requests are ambiguous - Ensures accurate assistance and reduces misunderstandings.",
    "Provide step-by-step guidance for complex tasks - Facilitates user comprehension and successful task completion.",
    "Acknowledge user emotions and respond empathetically - Builds trust and rapport with the user.",
    "Confirm and repeat the user's name to acknowledge recognition - Reinforces a personal connection and shows attentiveness.",
    "Offer alternative solutions when initial suggestions are not feasible - Demonstrates flexibility and commitment to user satisfaction.",
    "Provide specific suggestions tailored to the user's stated preferences - Shows attentiveness to user needs and enhances satisfaction.",
    "Continuously learn from user feedback to improve response quality - Enhances overall effectiveness and user experience.",
];

/// The procedural memory tier.
pub struct ProceduralMemory {
    provider: Arc<dyn Provider>,
    path: PathBuf,
    rules: RwLock<Vec<ProceduralRule>>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
}

impl ProceduralMemory {
    pub fn new(provider: Arc<dyn Provider>, path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            path: path.into(),
            rules: RwLock::new(Vec::new()),
            last_updated: RwLock::new(None),
        }
    }

    /// Load rules from the backing file, seeding it with the default set
    /// on first run.
    pub async fn initialize(&self) -> Result<(), MemoryError> {
        let loaded = if self.path.exists() {
            let content = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| MemoryError::procedural("failed to read rules file", e))?;
            let rules = parse_rules(&content);
            info!(count = rules.len(), path = %self.path.display(), "Loaded procedural rules");
            rules
        } else {
            let rules: Vec<ProceduralRule> = DEFAULT_RULES
                .iter()
                .enumerate()
                .filter_map(|(i, line)| {
                    let (instruction, rationale) = line.split_once(" - ")?;
                    Some(ProceduralRule::new(i + 1, instruction, rationale))
                })
                .collect();
            self.save(&rules).await?;
            info!(path = %self.path.display(), "Created default procedural rules");
            rules
        };

        *self.rules.write().await = loaded;
        *self.last_updated.write().await = Some(Utc::now());
        Ok(())
    }

    /// Current rules as the numbered block used in prompt assembly.
    /// Empty string when no rules exist.
    pub async fn retrieve(&self) -> String {
        let rules = self.rules.read().await;
        rules
            .iter()
            .map(format_rule)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Refine the rule set against feedback extracted from reflections.
    ///
    /// Placeholder and empty feedback items are dropped before prompting.
    /// If nothing informative remains, or the refinement output contains
    /// no well-formed rule lines, the current set is kept as-is.
    pub async fn update(
        &self,
        what_worked: &[String],
        what_to_avoid: &[String],
    ) -> Result<(), MemoryError> {
        let worked = informative(what_worked);
        let avoided = informative(what_to_avoid);
        if worked.is_empty() && avoided.is_empty() {
            debug!("No informative feedback, keeping current rules");
            return Ok(());
        }

        let prompt = {
            let rules = self.rules.read().await;
            update_prompt(&rules, &worked, &avoided)
        };

        let output = self
            .provider
            .complete_prompt(&prompt)
            .await
            .map_err(|e| MemoryError::procedural("rule refinement call failed", e))?;

        let mut new_rules = parse_rules(&output);
        if new_rules.is_empty() {
            debug!("Refinement output had no well-formed rules, keeping current set");
            return Ok(());
        }

        new_rules.truncate(MAX_RULES);
        reindex(&mut new_rules);
        self.save(&new_rules).await?;

        info!(count = new_rules.len(), "Updated procedural rules");
        *self.rules.write().await = new_rules;
        *self.last_updated.write().await = Some(Utc::now());
        Ok(())
    }

    /// Append a rule and persist.
    pub async fn add_rule(
        &self,
        instruction: &str,
        rationale: &str,
        category: Option<String>,
    ) -> Result<(), MemoryError> {
        let mut rules = self.rules.write().await;
        let mut rule = ProceduralRule::new(rules.len() + 1, instruction, rationale);
        rule.category = category;
        rules.push(rule);
        self.save(&rules).await
    }

    /// Remove a rule by its 1-based index, renumbering the remainder.
    /// Out-of-range indices are a no-op.
    pub async fn remove_rule(&self, index: usize) -> Result<(), MemoryError> {
        let mut rules = self.rules.write().await;
        if index == 0 || index > rules.len() {
            return Ok(());
        }
        let removed = rules.remove(index - 1);
        reindex(&mut rules);
        info!(instruction = %removed.instruction, "Removed procedural rule");
        self.save(&rules).await
    }

    /// Case-insensitive substring search over instructions and rationales.
    pub async fn search_rules(&self, keyword: &str) -> Vec<ProceduralRule> {
        let keyword = keyword.to_lowercase();
        self.rules
            .read()
            .await
            .iter()
            .filter(|r| {
                r.instruction.to_lowercase().contains(&keyword)
                    || r.rationale.to_lowercase().contains(&keyword)
            })
            .cloned()
            .collect()
    }

    /// Delete all rules and persist the empty set. Irreversible.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        let mut rules = self.rules.write().await;
        rules.clear();
        self.save(&rules).await?;
        info!("Cleared procedural memory");
        Ok(())
    }

    /// Snapshot of the current rule set.
    pub async fn rules(&self) -> Vec<ProceduralRule> {
        self.rules.read().await.clone()
    }

    /// Tier statistics (administrative, read-only).
    pub async fn stats(&self) -> Value {
        let rules = self.rules.read().await;
        let mut categories: Vec<String> = rules
            .iter()
            .filter_map(|r| r.category.clone())
            .collect();
        categories.sort();
        categories.dedup();

        json!({
            "total_rules": rules.len(),
            "last_updated": self.last_updated.read().await.map(|t| t.to_rfc3339()),
            "file_path": self.path.display().to_string(),
            "categories": categories,
        })
    }

    async fn save(&self, rules: &[ProceduralRule]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MemoryError::procedural("failed to create rules directory", e))?;
        }

        let body = rules.iter().map(format_rule).collect::<Vec<_>>().join("\n");
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| MemoryError::procedural("failed to write rules file", e))?;
        debug!(count = rules.len(), "Saved procedural rules");
        Ok(())
    }
}

fn format_rule(rule: &ProceduralRule) -> String {
    format!("{}. {} - {}", rule.index, rule.instruction, rule.rationale)
}

fn informative(items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|s| !s.trim().is_empty() && s.trim() != engram_core::memory::NOT_APPLICABLE)
        .cloned()
        .collect()
}

fn reindex(rules: &mut [ProceduralRule]) {
    for (i, rule) in rules.iter_mut().enumerate() {
        rule.index = i + 1;
    }
}

/// Parse rule lines from text. The grammar is strict: after stripping an
/// optional leading ordinal ("3. " or "3) "), a line must contain an
/// " - " instruction/rationale separator or it is skipped entirely.
fn parse_rules(text: &str) -> Vec<ProceduralRule> {
    let mut rules = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let line = strip_ordinal(line);
        let Some((instruction, rationale)) = line.split_once(" - ") else {
            debug!(line, "Skipping malformed rule line");
            continue;
        };

        let instruction = instruction.trim();
        if instruction.is_empty() {
            debug!(line, "Skipping rule line with empty instruction");
            continue;
        }

        rules.push(ProceduralRule::new(
            rules.len() + 1,
            instruction,
            rationale.trim(),
        ));
    }
    rules
}

fn strip_ordinal(line: &str) -> &str {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return line;
    }
    let rest = &line[digits..];
    match rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
        Some(tail) => tail.trim_start(),
        None => line,
    }
}

fn update_prompt(rules: &[ProceduralRule], worked: &[String], avoided: &[String]) -> String {
    let current = rules.iter().map(format_rule).collect::<Vec<_>>().join("\n");
    let worked = worked
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    let avoided = avoided
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are maintaining a continuously updated list of the most important procedural \
behavior instructions for an AI assistant. Your task is to refine and improve a list of key \
takeaways based on new conversation feedback while maintaining the most valuable existing \
insights.

CURRENT RULES:
{current}

NEW FEEDBACK:
What Worked Well:
{worked}

What To Avoid:
{avoided}

Please generate an updated list of up to {MAX_RULES} key takeaways that combines:
1. The most valuable insights from the current takeaways
2. New learnings from the recent feedback
3. Any synthesized insights combining multiple learnings

Requirements for each takeaway:
- Must be specific and actionable
- Should address a distinct aspect of behavior
- Include a clear rationale
- Written in imperative form (e.g., \"Maintain conversation context by...\")

Format each takeaway as:
[#]. [Instruction] - [Brief rationale]

Return only the list, no preamble or explanation."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_providers::ScriptedProvider;
    use tempfile::TempDir;

    fn tier_at(dir: &TempDir, provider: ScriptedProvider) -> ProceduralMemory {
        ProceduralMemory::new(Arc::new(provider), dir.path().join("rules.txt"))
    }

    #[tokio::test]
    async fn first_run_seeds_defaults_and_persists() {
        let dir = TempDir::new().unwrap();
        let tier = tier_at(&dir, ScriptedProvider::always(""));
        tier.initialize().await.unwrap();

        assert_eq!(tier.rules().await.len(), MAX_RULES);
        assert!(dir.path().join("rules.txt").exists());

        // Second instance reloads exactly what the first wrote
        let reloaded = tier_at(&dir, ScriptedProvider::always(""));
        reloaded.initialize().await.unwrap();
        assert_eq!(reloaded.retrieve().await, tier.retrieve().await);
    }

    #[tokio::test]
    async fn retrieve_formats_numbered_block() {
        let dir = TempDir::new().unwrap();
        let tier = tier_at(&dir, ScriptedProvider::always(""));
        tier.initialize().await.unwrap();
        tier.clear().await.unwrap();
        tier.add_rule("Be brief", "Saves time", None).await.unwrap();
        tier.add_rule("Cite sources", "Builds trust", None)
            .await
            .unwrap();

        assert_eq!(
            tier.retrieve().await,
            "1. Be brief - Saves time\n2. Cite sources - Builds trust"
        );
    }

    #[tokio::test]
    async fn update_replaces_rules_and_caps_at_limit() {
        let dir = TempDir::new().unwrap();
        let twelve: String = (1..=12)
            .map(|i| format!("{i}. Rule number {i} - Because {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let tier = tier_at(&dir, ScriptedProvider::always(&twelve));
        tier.initialize().await.unwrap();

        tier.update(&["examples helped".into()], &[]).await.unwrap();

        let rules = tier.rules().await;
        assert_eq!(rules.len(), MAX_RULES);
        assert_eq!(rules[0].instruction, "Rule number 1");
        assert_eq!(rules[9].index, 10);
    }

    #[tokio::test]
    async fn malformed_refinement_output_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let tier = tier_at(&dir, ScriptedProvider::always("I have no list for you."));
        tier.initialize().await.unwrap();
        let before = tier.retrieve().await;

        tier.update(&["something".into()], &[]).await.unwrap();

        assert_eq!(tier.retrieve().await, before);
    }

    #[tokio::test]
    async fn placeholder_feedback_skips_refinement() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::always("1. Should never appear - n/a");
        let tier = tier_at(&dir, provider);
        tier.initialize().await.unwrap();
        let before = tier.retrieve().await;

        tier.update(&["N/A".into(), "  ".into()], &["N/A".into()])
            .await
            .unwrap();

        assert_eq!(tier.retrieve().await, before);
    }

    #[tokio::test]
    async fn remove_rule_renumbers_and_ignores_out_of_range() {
        let dir = TempDir::new().unwrap();
        let tier = tier_at(&dir, ScriptedProvider::always(""));
        tier.initialize().await.unwrap();
        tier.clear().await.unwrap();
        tier.add_rule("a", "ra", None).await.unwrap();
        tier.add_rule("b", "rb", None).await.unwrap();
        tier.add_rule("c", "rc", None).await.unwrap();

        tier.remove_rule(2).await.unwrap();
        let rules = tier.rules().await;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].instruction, "c");
        assert_eq!(rules[1].index, 2);

        tier.remove_rule(0).await.unwrap();
        tier.remove_rule(99).await.unwrap();
        assert_eq!(tier.rules().await.len(), 2);
    }

    #[test]
    fn parser_enforces_separator_grammar() {
        let parsed = parse_rules(
            "Here are the rules:\n\
             1. Keep answers short - Respects the reader\n\
             2) Use headings - Aids scanning\n\
             just a stray sentence\n\
             \n\
             Ask before assuming - Avoids rework",
        );
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].instruction, "Keep answers short");
        assert_eq!(parsed[1].instruction, "Use headings");
        assert_eq!(parsed[2].instruction, "Ask before assuming");
        assert_eq!(parsed[2].index, 3);
    }

    #[tokio::test]
    async fn search_rules_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let tier = tier_at(&dir, ScriptedProvider::always(""));
        tier.initialize().await.unwrap();
        tier.clear().await.unwrap();
        tier.add_rule("Cite Sources", "Builds trust", None)
            .await
            .unwrap();

        assert_eq!(tier.search_rules("sources").await.len(), 1);
        assert_eq!(tier.search_rules("TRUST").await.len(), 1);
        assert!(tier.search_rules("missing").await.is_empty());
    }
}
