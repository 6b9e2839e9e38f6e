//! The memory orchestration engine.
//!
//! One `MemoryOrchestrator` is shared across sessions; everything
//! conversation-local lives in a `SessionContext` the caller owns and
//! passes in by `&mut`. That split keeps concurrent sessions isolated
//! without any per-session locking inside the engine.
//!
//! Error policy: core operations (processing a turn, consolidating at
//! conversation end) propagate any tier or provider failure uncaught —
//! no retry, no partial-result fallback. Administrative reads
//! (`memory_stats`) are best-effort and report per-tier errors in-band
//! instead of failing.

use std::path::PathBuf;
use std::sync::Arc;

use engram_core::error::{Error, Result};
use engram_core::memory::{MemoryTier, Reflection, SemanticChunk};
use engram_core::provider::Provider;
use engram_core::state::AgentState;
use engram_core::store::SearchStore;
use engram_memory::{EpisodicMemory, ProceduralMemory, SemanticMemory, WorkingMemory};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::context::assemble_system_context;

/// Per-session mutable state: the working-memory log plus the transient
/// accumulators. Created by [`MemoryOrchestrator::new_session`], owned by
/// the caller for the session's lifetime.
pub struct SessionContext {
    pub working: WorkingMemory,
    pub state: AgentState,
}

impl SessionContext {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            working: WorkingMemory::with_capacity(capacity),
            state: AgentState::new(),
        }
    }
}

/// Tier wiring for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub episodic_collection: String,
    pub semantic_collection: String,
    pub semantic_chunk_limit: usize,
    pub hybrid_alpha: f32,
    pub procedural_path: PathBuf,
    pub working_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            episodic_collection: "episodic_memory".into(),
            semantic_collection: "knowledge_base".into(),
            semantic_chunk_limit: 15,
            hybrid_alpha: 0.5,
            procedural_path: PathBuf::from("procedural_rules.txt"),
            working_capacity: engram_memory::working::DEFAULT_CAPACITY,
        }
    }
}

/// The session-agnostic memory engine.
pub struct MemoryOrchestrator {
    provider: Arc<dyn Provider>,
    store: Arc<dyn SearchStore>,
    episodic: EpisodicMemory,
    semantic: SemanticMemory,
    procedural: ProceduralMemory,
    working_capacity: usize,
    initialized: RwLock<bool>,
}

impl MemoryOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn SearchStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let episodic = EpisodicMemory::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            config.episodic_collection,
            config.hybrid_alpha,
        );
        let semantic = SemanticMemory::new(
            Arc::clone(&store),
            config.semantic_collection,
            config.hybrid_alpha,
            config.semantic_chunk_limit,
        );
        let procedural = ProceduralMemory::new(Arc::clone(&provider), config.procedural_path);

        Self {
            provider,
            store,
            episodic,
            semantic,
            procedural,
            working_capacity: config.working_capacity,
            initialized: RwLock::new(false),
        }
    }

    /// A fresh session context sized to the configured working-memory
    /// capacity.
    pub fn new_session(&self) -> SessionContext {
        SessionContext::with_capacity(self.working_capacity)
    }

    /// Load file-backed state. Idempotent: later calls are no-ops, and
    /// every entry point that needs it calls it implicitly.
    pub async fn initialize(&self) -> Result<()> {
        {
            let initialized = self.initialized.read().await;
            if *initialized {
                return Ok(());
            }
        }
        let mut initialized = self.initialized.write().await;
        if *initialized {
            return Ok(());
        }
        self.procedural.initialize().await?;
        *initialized = true;
        info!("Memory orchestrator initialized");
        Ok(())
    }

    /// Process one user turn through all memory tiers and return the
    /// assistant's reply.
    pub async fn process_message(
        &self,
        ctx: &mut SessionContext,
        user_input: &str,
    ) -> Result<String> {
        self.initialize().await?;

        // All three long-term reads must settle before the completion call;
        // a failing read aborts the turn
        let episodic = self
            .episodic
            .retrieve(user_input)
            .await
            .inspect_err(|_| ctx.state.error_count += 1)?;
        let semantic = self
            .semantic
            .retrieve(user_input)
            .await
            .inspect_err(|_| ctx.state.error_count += 1)?;
        let procedural = self.procedural.retrieve().await;

        // A fresh system turn per message; earlier ones stay in the log
        let system_context = assemble_system_context(episodic.as_ref(), &procedural);
        ctx.working.append_system(system_context);

        if !semantic.is_empty() {
            ctx.working.append_context(&semantic);
        }
        ctx.working.append_user(user_input);

        let response = match self.provider.complete(&ctx.working.messages(false)).await {
            Ok(text) => text,
            Err(e) => {
                ctx.state.error_count += 1;
                return Err(e.into());
            }
        };
        ctx.working.append_assistant(&response);

        if let Some(entry) = episodic {
            if Reflection::is_informative(&entry.conversation_summary) {
                ctx.state.add_episodic(&entry.conversation_summary);
            }
            if Reflection::is_informative(&entry.what_worked) {
                ctx.state.add_what_worked(&entry.what_worked);
            }
            if Reflection::is_informative(&entry.what_to_avoid) {
                ctx.state.add_what_to_avoid(&entry.what_to_avoid);
            }
            ctx.state.current_context_tags = entry.context_tags;
        }
        ctx.state.total_messages += 1;
        ctx.state.touch();

        Ok(response)
    }

    /// Consolidate a finished conversation into long-term memory, then
    /// clear the session's transient state.
    ///
    /// A conversation with no user/assistant turns consolidates nothing.
    /// Tier write failures propagate; the session state is only cleared
    /// after both writes succeed.
    pub async fn end_conversation(&self, ctx: &mut SessionContext) -> Result<()> {
        self.initialize().await?;

        let transcript = ctx.working.messages(true);
        if transcript.is_empty() {
            debug!("Empty conversation, nothing to consolidate");
            ctx.working.clear();
            ctx.state.reset();
            return Ok(());
        }

        self.episodic.store(&transcript).await?;

        let worked: Vec<String> = ctx.state.what_worked.iter().cloned().collect();
        let avoided: Vec<String> = ctx.state.what_to_avoid.iter().cloned().collect();
        self.procedural.update(&worked, &avoided).await?;

        ctx.working.clear();
        ctx.state.reset();
        info!("Conversation ended, long-term memory updated");
        Ok(())
    }

    /// Tier-scoped retrieval for inspection surfaces (CLI, HTTP API).
    ///
    /// The episodic tier always returns its single top hit (with the usual
    /// access-tracking write); the other tiers honor `limit`.
    pub async fn retrieve(
        &self,
        ctx: &SessionContext,
        tier: MemoryTier,
        query: &str,
        limit: usize,
    ) -> Result<Value> {
        self.initialize().await?;
        let value = match tier {
            MemoryTier::Working => {
                let hits: Vec<Value> = ctx
                    .working
                    .search(query)
                    .iter()
                    .take(limit)
                    .map(|m| json!({ "role": m.role, "content": m.content }))
                    .collect();
                Value::Array(hits)
            }
            MemoryTier::Episodic => match self.episodic.retrieve(query).await? {
                Some(entry) => serde_json::to_value(entry)?,
                None => Value::Null,
            },
            MemoryTier::Semantic => {
                let chunks = self.semantic.search(query, limit).await?;
                serde_json::to_value(chunks)?
            }
            MemoryTier::Procedural => {
                let mut rules = self.procedural.search_rules(query).await;
                rules.truncate(limit);
                serde_json::to_value(rules)?
            }
        };
        Ok(value)
    }

    /// Erase one tier. Irreversible for the long-term tiers.
    pub async fn clear_tier(&self, ctx: &mut SessionContext, tier: MemoryTier) -> Result<()> {
        self.initialize().await?;
        match tier {
            MemoryTier::Working => {
                ctx.working.clear();
                ctx.state.reset();
            }
            MemoryTier::Episodic => self.episodic.clear().await?,
            MemoryTier::Semantic => self.semantic.clear().await?,
            MemoryTier::Procedural => self.procedural.clear().await?,
        }
        Ok(())
    }

    /// Ingest one knowledge chunk into semantic memory.
    pub async fn ingest_chunk(&self, chunk: &SemanticChunk) -> Result<String> {
        self.initialize().await?;
        Ok(self.semantic.store_chunk(chunk).await?)
    }

    /// Combined statistics across all tiers. Best-effort: a failing tier
    /// reports its error in place of its stats and never fails the call.
    pub async fn memory_stats(&self, ctx: &SessionContext) -> Value {
        if let Err(e) = self.initialize().await {
            warn!(error = %e, "Initialization failed during stats collection");
        }
        let episodic = self
            .episodic
            .stats()
            .await
            .unwrap_or_else(|e| json!({ "error": e.to_string() }));
        let semantic = self
            .semantic
            .stats()
            .await
            .unwrap_or_else(|e| json!({ "error": e.to_string() }));

        json!({
            "working": ctx.working.stats(),
            "episodic": episodic,
            "semantic": semantic,
            "procedural": self.procedural.stats().await,
            "session": {
                "session_id": ctx.state.session_id.to_string(),
                "total_messages": ctx.state.total_messages,
                "error_count": ctx.state.error_count,
                "context_tags": ctx.state.current_context_tags,
            },
        })
    }

    /// Release backing resources. The orchestrator is unusable afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        self.store
            .close()
            .await
            .map_err(Error::Store)?;
        info!("Memory orchestrator shut down");
        Ok(())
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn semantic(&self) -> &SemanticMemory {
        &self.semantic
    }

    pub fn procedural(&self) -> &ProceduralMemory {
        &self.procedural
    }

    pub fn episodic(&self) -> &EpisodicMemory {
        &self.episodic
    }
}
