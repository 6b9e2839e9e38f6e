//! Provider trait — the abstraction over the text-completion capability.
//!
//! A Provider knows how to send an ordered, role-tagged message sequence to
//! an LLM and get text back. The memory engine uses it three ways:
//! - `complete` — generate the next assistant turn from working memory
//! - `complete_prompt` — run a single prompt-driven step (reflection,
//!   procedural rule update)
//! - `embed` — produce embedding vectors for hybrid search backends

use async_trait::async_trait;
use crate::error::ProviderError;
use crate::message::Message;

/// The completion capability.
///
/// Implementations: OpenAI-compatible HTTP endpoints (OpenAI, OpenRouter,
/// Ollama), scripted providers for tests.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send an ordered message sequence and get the completion text.
    async fn complete(&self, messages: &[Message])
        -> std::result::Result<String, ProviderError>;

    /// Run a single free-standing prompt and get the completion text.
    ///
    /// Default implementation wraps the prompt as one user turn.
    async fn complete_prompt(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        self.complete(&[Message::user(prompt)]).await
    }

    /// Produce one embedding vector per input text.
    ///
    /// Backends without an embedding endpoint return `NotConfigured`;
    /// hybrid search then degrades to keyword-only.
    async fn embed(
        &self,
        _inputs: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "{} does not support embeddings",
            self.name()
        )))
    }

    /// Check whether the provider is reachable.
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, messages: &[Message]) -> Result<String, ProviderError> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn complete_prompt_defaults_to_single_user_turn() {
        let reply = EchoProvider.complete_prompt("reflect on this").await.unwrap();
        assert_eq!(reply, "reflect on this");
    }

    #[tokio::test]
    async fn embed_defaults_to_not_configured() {
        let err = EchoProvider.embed(&["text".into()]).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
