//! `engram reset` — Erase memory tiers.

use engram_core::memory::MemoryTier;

pub async fn run(tier: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let orchestrator = super::build_orchestrator(&config).await?;
    let mut ctx = orchestrator.new_session();

    let tiers: Vec<MemoryTier> = match tier {
        Some(name) => vec![name.parse()?],
        None => vec![
            MemoryTier::Episodic,
            MemoryTier::Semantic,
            MemoryTier::Procedural,
        ],
    };

    for tier in tiers {
        orchestrator.clear_tier(&mut ctx, tier).await?;
        println!("  Cleared {tier} memory");
    }

    orchestrator.shutdown().await?;
    Ok(())
}
