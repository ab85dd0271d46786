//! # DeepKnowledge
//!
//! Grounded question answering over the websites and documents you add to
//! a knowledge base.
//!
//! Sources are loaded into records, split into passages, embedded, and
//! published as an immutable index snapshot. A question retrieves the most
//! similar passages above a relevance cutoff and the chat model answers
//! from those passages only, with the conversation so far as memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │   Loader     │──▶│ Knowledge    │──▶│ retrieve +     │
//! │ web / files  │   │ Store (core) │   │ answer (core)  │
//! └──────────────┘   └──────────────┘   └───────┬────────┘
//!                                               ▼
//!                                        ┌──────────────┐
//!                                        │  CLI  (dk)   │
//!                                        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! dk ingest --url https://www.rust-lang.org/learn --dir ./docs
//! dk ask "How do I install Rust?"
//! dk chat
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`assistant`] | Store, collaborators, and sessions behind one facade |
//! | [`loader`] | Websites and documents to records |
//! | [`extract`] | PDF and OOXML text extraction |
//! | [`html`] | HTML to text |
//! | [`embedding`] | Embedding collaborators |
//! | [`llm`] | Chat model collaborator |
//! | [`sources`], [`ingest`], [`ask`] | CLI commands |
//!
//! The store, retriever, composer, and session types live in
//! [`deepknowledge_core`]; the ones a caller needs are re-exported here.

pub mod ask;
pub mod assistant;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod html;
mod http;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod sources;

pub use assistant::{Assistant, IngestSummary};
pub use deepknowledge_core::compose::GroundedAnswer;
pub use deepknowledge_core::models::{SourceKey, SourceKind};
pub use deepknowledge_core::session::ConversationSession;
pub use deepknowledge_core::RagError;
