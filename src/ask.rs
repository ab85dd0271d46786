//! `dk ask` and `dk chat`.

use anyhow::Result;
use deepknowledge_core::compose::GroundedAnswer;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::assistant::Assistant;
use crate::ingest::print_summary;
use crate::sources::print_knowledge_base;

/// Answer one question in a fresh session.
pub async fn run_ask(assistant: &Assistant, question: &str, json: bool) -> Result<()> {
    let summary = assistant.seed_defaults().await?;
    if !summary.failures.is_empty() {
        warn!(failed = summary.failures.len(), "some default sources could not be loaded");
    }

    let mut session = assistant.new_session();
    let grounded = assistant.ask(&mut session, question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&grounded)?);
    } else {
        print_answer(&grounded);
    }
    Ok(())
}

pub fn print_answer(grounded: &GroundedAnswer) {
    println!("{}", grounded.answer);
    println!();
    if grounded.sources.is_empty() {
        println!("(no source in the knowledge base cleared the relevance cutoff)");
        return;
    }
    println!("Sources:");
    for (i, hit) in grounded.sources.iter().enumerate() {
        println!("{}. [{:.2}] {} {}", i + 1, hit.score, hit.kind, hit.source_ref);
    }
}

/// Interactive session over stdin until `quit` or end of input.
///
/// `/sources` lists the knowledge base and `/add <url>` ingests a website
/// without leaving the conversation.
pub async fn run_chat(assistant: &Assistant) -> Result<()> {
    let summary = assistant.seed_defaults().await?;
    if !summary.failures.is_empty() {
        print_summary(&summary);
    }

    let mut session = assistant.new_session();
    if let Some(greeting) = session.turns().first() {
        println!("assistant> {}", greeting.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nyou> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            break;
        }

        if input == "/sources" {
            print_knowledge_base(&assistant.list_knowledge_base());
            continue;
        }
        if let Some(url) = input.strip_prefix("/add ") {
            match assistant.ingest_sources(&[url.trim().to_string()], &[]).await {
                Ok(summary) => print_summary(&summary),
                Err(e) => println!("error: {}", e),
            }
            continue;
        }

        match assistant.ask(&mut session, input).await {
            Ok(grounded) => {
                println!();
                print!("assistant> ");
                print_answer(&grounded);
            }
            Err(e) => println!("error ({}): {}", e.kind(), e),
        }
    }
    Ok(())
}
