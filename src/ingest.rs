//! `dk ingest`: add websites and documents, then report per-item outcomes.

use anyhow::Result;
use std::path::PathBuf;

use crate::assistant::{Assistant, IngestSummary};

/// Sources named on the command line, on top of the configured defaults.
#[derive(Debug, Default)]
pub struct IngestRequest {
    pub urls: Vec<String>,
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

pub async fn run_ingest(assistant: &Assistant, request: IngestRequest) -> Result<()> {
    let mut summary = assistant.seed_defaults().await?;
    summary.merge(assistant.ingest_sources(&request.urls, &request.files).await?);
    for dir in &request.dirs {
        summary.merge(assistant.ingest_directory(dir).await?);
    }

    print_summary(&summary);
    println!(
        "Knowledge base: {} source(s), index version {}",
        assistant.list_knowledge_base().len(),
        summary.version
    );
    Ok(())
}

pub fn print_summary(summary: &IngestSummary) {
    for key in &summary.added {
        println!("added    {:<10} {}", key.kind, key.source_ref);
    }
    for failure in &summary.failures {
        println!(
            "skipped  {:<10} {} ({})",
            failure.kind(),
            failure.source_ref().unwrap_or("-"),
            failure
        );
    }
    if summary.added.is_empty() && summary.failures.is_empty() {
        println!("Nothing new to add.");
    }
}
