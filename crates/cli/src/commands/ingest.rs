//! `engram ingest` — Load a document into semantic memory.
//!
//! Splits the document on blank lines and packs paragraphs into chunks of
//! roughly `CHUNK_TARGET` characters. Paragraphs larger than the target
//! become chunks of their own rather than being split mid-sentence.

use engram_core::memory::SemanticChunk;
use serde_json::Map;
use std::path::Path;

const CHUNK_TARGET: usize = 1_200;

pub async fn run(path: &str, source: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let orchestrator = super::build_orchestrator(&config).await?;

    let text = std::fs::read_to_string(path)?;
    let source = source.unwrap_or_else(|| {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    });

    let chunks = chunk_text(&text);
    if chunks.is_empty() {
        return Err(format!("{path} contains no text to ingest").into());
    }

    let total = chunks.len();
    for (index, content) in chunks.into_iter().enumerate() {
        let chunk = SemanticChunk {
            id: None,
            content,
            source: source.clone(),
            chunk_index: index,
            metadata: Map::new(),
        };
        orchestrator.ingest_chunk(&chunk).await?;
        print!("\r  Ingesting {source}: {}/{total}", index + 1);
        use std::io::Write;
        std::io::stdout().flush()?;
    }
    println!();
    println!("  Ingested {total} chunks from {source}");

    orchestrator.shutdown().await?;
    Ok(())
}

/// Pack blank-line-separated paragraphs into chunks of about
/// `CHUNK_TARGET` characters.
fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + paragraph.len() + 2 > CHUNK_TARGET {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
