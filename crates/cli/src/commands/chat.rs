//! `engram chat` — Interactive or single-message conversation.

use std::io::{BufRead, Write};

use engram_agent::ConversationSession;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let orchestrator = super::build_orchestrator(&config).await?;
    let mut session = ConversationSession::new(orchestrator.clone());
    session.start().await?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = session.process(&msg).await?;
        eprint!("\r              \r");
        println!("{response}");
        session.end().await?;
        orchestrator.shutdown().await?;
        return Ok(());
    }

    println!();
    println!("  engram — conversational agent with tiered memory");
    println!();
    println!("  Model:    {}", config.model);
    println!("  Session:  {}", session.session_id());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' to end the conversation and consolidate memory.");
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        eprint!("  ...");
        match session.process(input).await {
            Ok(response) => {
                eprint!("\r     \r");
                println!();
                for line in response.lines() {
                    println!("  Agent > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Consolidating memory...");
    let summary = session.end().await?;
    println!(
        "  Conversation {} ended: {} messages in {:.1}s",
        summary.session_id, summary.total_messages, summary.duration_seconds
    );
    orchestrator.shutdown().await?;
    println!("  Goodbye!");
    Ok(())
}
