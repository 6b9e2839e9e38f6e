//! Conversation lifecycle wrapper.
//!
//! Pairs one `SessionContext` with the shared orchestrator and tracks
//! timing so `end` can report a summary. Errors during processing are
//! wrapped at the session boundary with the cause preserved.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use engram_core::error::{Error, Result};
use serde::Serialize;
use tracing::info;

use crate::orchestrator::{MemoryOrchestrator, SessionContext};

/// What a finished conversation looked like.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub duration_seconds: f64,
    pub total_messages: u64,
    /// Wall-clock duration divided by message count; zero-message
    /// conversations divide by one instead of failing.
    pub avg_response_time_seconds: f64,
}

/// One conversation against the shared memory engine.
pub struct ConversationSession {
    orchestrator: Arc<MemoryOrchestrator>,
    ctx: SessionContext,
    started_at: Option<DateTime<Utc>>,
    messages: u64,
}

impl ConversationSession {
    pub fn new(orchestrator: Arc<MemoryOrchestrator>) -> Self {
        let ctx = orchestrator.new_session();
        Self {
            orchestrator,
            ctx,
            started_at: None,
            messages: 0,
        }
    }

    pub fn session_id(&self) -> String {
        self.ctx.state.session_id.to_string()
    }

    /// Mark the conversation started and make sure the engine is ready.
    pub async fn start(&mut self) -> Result<()> {
        self.started_at = Some(Utc::now());
        info!(session_id = %self.session_id(), "Starting conversation");
        self.orchestrator.initialize().await
    }

    /// Process one user message and return the reply.
    pub async fn process(&mut self, user_input: &str) -> Result<String> {
        self.messages += 1;
        self.orchestrator
            .process_message(&mut self.ctx, user_input)
            .await
            .map_err(|e| Error::session("failed to process message", e))
    }

    /// End the conversation: consolidate into long-term memory and
    /// report the summary.
    pub async fn end(&mut self) -> Result<SessionSummary> {
        let session_id = self.session_id();
        let ended_at = Utc::now();
        let duration_seconds = self
            .started_at
            .map(|s| (ended_at - s).as_seconds_f64())
            .unwrap_or(0.0);

        self.orchestrator
            .end_conversation(&mut self.ctx)
            .await
            .map_err(|e| Error::session("failed to end conversation", e))?;

        let summary = SessionSummary {
            session_id: session_id.clone(),
            duration_seconds,
            total_messages: self.messages,
            avg_response_time_seconds: duration_seconds / self.messages.max(1) as f64,
        };
        info!(session_id = %session_id, messages = self.messages, "Ended conversation");
        Ok(summary)
    }

    /// End the current conversation and begin a new one under a fresh
    /// session id.
    pub async fn reset(&mut self) -> Result<()> {
        self.orchestrator
            .end_conversation(&mut self.ctx)
            .await
            .map_err(|e| Error::session("failed to reset conversation", e))?;

        self.ctx = self.orchestrator.new_session();
        self.started_at = Some(Utc::now());
        self.messages = 0;
        info!(session_id = %self.session_id(), "Reset conversation");
        Ok(())
    }

    /// The session's mutable context, for inspection surfaces.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.ctx
    }
}
