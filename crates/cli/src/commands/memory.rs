//! `engram memory` — Query one memory tier.

use engram_core::memory::MemoryTier;

pub async fn run(tier: &str, query: &str, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let tier: MemoryTier = tier.parse()?;
    let config = super::load_config()?;
    let orchestrator = super::build_orchestrator(&config).await?;

    // No live conversation here, so working-tier queries see an empty log
    let ctx = orchestrator.new_session();
    let result = orchestrator.retrieve(&ctx, tier, query, limit).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    orchestrator.shutdown().await?;
    Ok(())
}
