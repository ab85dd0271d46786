//! # DeepKnowledge Core
//!
//! Runtime-agnostic logic for DeepKnowledge: the record model, the
//! knowledge store with its atomically published vector index, the
//! retriever, the grounded answer composer, and the conversation session.
//!
//! Network access, file parsing, and configuration live in the
//! `deepknowledge` application crate. Everything here talks to the outside
//! world through the collaborator traits [`embedding::Embedder`],
//! [`index::VectorIndexBuilder`], and [`compose::ChatModel`].
//!
//! ```text
//! Records ──▶ KnowledgeStore ──▶ retrieve() ──▶ answer() ──▶ GroundedAnswer
//!             (chunk + embed)    (top-k, cutoff)  (context + history)
//! ```

pub mod chunk;
pub mod compose;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod session;
pub mod store;

pub use error::{RagError, Result};
