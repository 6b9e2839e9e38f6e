//! `engram stats` — Show memory statistics across all tiers.

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let orchestrator = super::build_orchestrator(&config).await?;

    let ctx = orchestrator.new_session();
    let stats = orchestrator.memory_stats(&ctx).await;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    orchestrator.shutdown().await?;
    Ok(())
}
