pub mod chat;
pub mod gateway;
pub mod ingest;
pub mod memory;
pub mod reset;
pub mod stats;

use std::sync::Arc;

use engram_agent::{MemoryOrchestrator, OrchestratorConfig};
use engram_config::AppConfig;
use engram_core::provider::Provider;
use engram_core::store::SearchStore;
use engram_providers::OpenAiCompatProvider;
use engram_store::{InMemoryStore, SqliteStore};

/// Load config, validate it, and require an API key.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate()?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY      (for OpenAI direct)");
        eprintln!("    OPENROUTER_API_KEY  (for OpenRouter)");
        eprintln!("    ENGRAM_API_KEY      (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!(
            "    {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}

/// Build the completion provider from config.
pub fn build_provider(config: &AppConfig) -> Arc<dyn Provider> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let provider = OpenAiCompatProvider::new(
        "openai-compat",
        &config.provider.base_url,
        api_key,
        &config.model,
    )
    .with_embedding_model(&config.provider.embedding_model)
    .with_temperature(config.temperature);
    Arc::new(provider)
}

/// Build the search store from config.
pub async fn build_store(
    config: &AppConfig,
    embedder: Arc<dyn Provider>,
) -> Result<Arc<dyn SearchStore>, Box<dyn std::error::Error>> {
    match config.store.backend.as_str() {
        "in_memory" => Ok(Arc::new(InMemoryStore::new())),
        _ => {
            if let Some(parent) = config.store.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let path = config.store.path.display().to_string();
            let store = SqliteStore::new(&path).await?;
            let store = if config.provider.embedding_model.is_empty() {
                store
            } else {
                store.with_embedder(embedder)
            };
            Ok(Arc::new(store))
        }
    }
}

/// Wire provider, store, and memory tiers into the shared orchestrator.
pub async fn build_orchestrator(
    config: &AppConfig,
) -> Result<Arc<MemoryOrchestrator>, Box<dyn std::error::Error>> {
    let provider = build_provider(config);
    let store = build_store(config, Arc::clone(&provider)).await?;

    let orchestrator_config = OrchestratorConfig {
        episodic_collection: config.memory.episodic_collection.clone(),
        semantic_collection: config.memory.semantic_collection.clone(),
        semantic_chunk_limit: config.memory.semantic_chunk_limit,
        hybrid_alpha: config.memory.hybrid_alpha,
        procedural_path: config.memory.procedural_path.clone(),
        working_capacity: config.memory.working_capacity,
    };

    let orchestrator = MemoryOrchestrator::new(provider, store, orchestrator_config);
    orchestrator.initialize().await?;
    Ok(Arc::new(orchestrator))
}
