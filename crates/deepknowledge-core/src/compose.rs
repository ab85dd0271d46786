//! Grounded answer composition.
//!
//! Builds the prompt for a single question:
//!
//! ```text
//! [system]     instructions + context blob (retrieved hits as JSON)
//! [history..]  prior turns, verbatim, in order
//! [user]       the new question
//! ```
//!
//! and returns the model's reply together with the exact hits that were
//! serialized into the system message.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::models::{ChatMessage, RetrievalHit};
use crate::retrieve::{retrieve, RetrievalParams};
use crate::store::KnowledgeStore;

/// Placed in the context slot when retrieval found nothing relevant.
pub const NO_CONTEXT_MARKER: &str = "No relevant information found in the knowledge base.";

/// A chat-completion service. Stateless: all memory arrives in `messages`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage]) -> AnyResult<String>;
}

/// The model's answer and the sources it was given.
#[derive(Debug, Clone, Serialize)]
pub struct GroundedAnswer {
    pub answer: String,
    /// Exactly the hits placed in the prompt, best first.
    pub sources: Vec<RetrievalHit>,
    /// True when no passage cleared the similarity cutoff.
    pub insufficient_context: bool,
}

/// Serialize hits for the system message, or the no-context marker.
pub fn context_blob(hits: &[RetrievalHit]) -> Result<String> {
    if hits.is_empty() {
        return Ok(NO_CONTEXT_MARKER.to_string());
    }
    serde_json::to_string_pretty(hits)
        .map_err(|e| RagError::GenerationFailed(format!("could not serialize context: {}", e)))
}

/// The system instruction wrapping a context blob.
pub fn system_instruction(context: &str) -> String {
    format!(
        "You are a question-answering assistant for a private knowledge base. \
Answer using only the context sources listed below, which were retrieved from \
the websites and documents the user added. Never invent facts that the sources \
do not support.\n\
\n\
Context sources:\n\
{context}\n\
\n\
Rules:\n\
- Base every statement on the context sources above, and cite the source URL or file name you relied on.\n\
- If the sources do not contain enough information to answer, say plainly that the knowledge base is insufficient for this question instead of guessing, and suggest what additional source would help.\n\
- If sources disagree with each other, point out the conflict and name the sources on each side rather than picking one silently.\n\
- Keep answers accurate, relevant, and concise."
    )
}

/// System instruction first, then history in its original order, then the
/// new question.
pub fn assemble_messages(
    system: String,
    history: &[ChatMessage],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(question));
    messages
}

/// Answer `question` from the store's content.
///
/// Fails with [`RagError::RetrievalFailed`] if the question cannot be
/// embedded and [`RagError::GenerationFailed`] if the model call fails or
/// returns nothing. Neither the store nor `history` is modified.
pub async fn answer(
    question: &str,
    history: &[ChatMessage],
    store: &KnowledgeStore,
    chat: &dyn ChatModel,
    params: &RetrievalParams,
) -> Result<GroundedAnswer> {
    let sources = retrieve(store, question, params).await?;
    let context = context_blob(&sources)?;
    let messages = assemble_messages(system_instruction(&context), history, question);

    debug!(
        model = chat.model_name(),
        sources = sources.len(),
        history = history.len(),
        "requesting grounded answer"
    );
    let reply = chat.chat(&messages).await.map_err(|e| {
        warn!(model = chat.model_name(), error = %e, "chat completion failed");
        RagError::GenerationFailed(format!("{:#}", e))
    })?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(RagError::GenerationFailed(
            "model returned an empty response".to_string(),
        ));
    }

    Ok(GroundedAnswer {
        answer: reply.to_string(),
        insufficient_context: sources.is_empty(),
        sources,
    })
}
