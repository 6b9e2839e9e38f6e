//! Scripted provider — returns canned responses in sequence.
//!
//! Used by tests and offline demos. Each call to `complete` (including
//! `complete_prompt`) pops the next response from the queue; when the
//! queue is exhausted the last response repeats.

use async_trait::async_trait;
use engram_core::error::ProviderError;
use engram_core::message::Message;
use engram_core::provider::Provider;
use std::sync::Mutex;

/// A provider that returns a sequence of scripted responses.
pub struct ScriptedProvider {
    responses: Vec<String>,
    call_count: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            call_count: Mutex::new(0),
        }
    }

    /// A provider that always returns the same text.
    pub fn always(text: &str) -> Self {
        Self::new(vec![text.to_string()])
    }

    /// Number of completion calls made so far.
    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _messages: &[Message]) -> Result<String, ProviderError> {
        if self.responses.is_empty() {
            return Err(ProviderError::NotConfigured(
                "scripted provider has no responses".into(),
            ));
        }

        let mut count = self.call_count.lock().unwrap();
        let index = (*count).min(self.responses.len() - 1);
        *count += 1;
        Ok(self.responses[index].clone())
    }
}
