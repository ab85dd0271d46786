//! `dk sources`: print the knowledge base.

use deepknowledge_core::models::SourceKey;

use crate::assistant::Assistant;
use crate::ingest::print_summary;

/// Seed the default sources, then list everything indexed.
pub async fn run_sources(assistant: &Assistant) -> anyhow::Result<()> {
    let summary = assistant.seed_defaults().await?;
    if !summary.failures.is_empty() {
        print_summary(&summary);
        println!();
    }
    print_knowledge_base(&assistant.list_knowledge_base());
    Ok(())
}

pub fn print_knowledge_base(sources: &[SourceKey]) {
    if sources.is_empty() {
        println!("Knowledge base is empty.");
        return;
    }
    println!("{:<10} SOURCE", "TYPE");
    for key in sources {
        println!("{:<10} {}", key.kind, key.source_ref);
    }
}
