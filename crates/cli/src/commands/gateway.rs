//! `engram gateway` — Start the HTTP API server.

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let orchestrator = super::build_orchestrator(&config).await?;

    let port = port.unwrap_or(config.gateway.port);
    println!(
        "  Starting gateway on http://{}:{port}",
        config.gateway.host
    );
    engram_gateway::start(orchestrator, &config.gateway.host, port).await
}
