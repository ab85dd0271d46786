//! Failure taxonomy for ingestion, indexing, retrieval, and generation.
//!
//! Every variant is distinct so a caller can render a specific message;
//! collaborator errors are mapped into one of these at the core boundary.

use crate::models::SourceKind;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Malformed URL or unsupported file type.
    #[error("invalid source '{source_ref}': {reason}")]
    InvalidSource { source_ref: String, reason: String },

    /// The source is already in the knowledge base.
    #[error("{kind} '{source_ref}' is already in the knowledge base")]
    DuplicateSource { kind: SourceKind, source_ref: String },

    /// Network or parse failure on a single item.
    #[error("failed to load '{source_ref}': {reason}")]
    FetchFailed { source_ref: String, reason: String },

    /// Embedding or index construction failed; the store is unchanged.
    #[error("index build failed: {0}")]
    IndexBuildFailed(String),

    /// The query could not be embedded or compared against the index.
    #[error("retrieval failed: {0}")]
    RetrievalFailed(String),

    /// The language model call failed; the session is unchanged.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

impl RagError {
    pub fn invalid_source(source_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        RagError::InvalidSource {
            source_ref: source_ref.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch_failed(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        RagError::FetchFailed {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable label for UIs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::InvalidSource { .. } => "invalid_source",
            RagError::DuplicateSource { .. } => "duplicate_source",
            RagError::FetchFailed { .. } => "fetch_failed",
            RagError::IndexBuildFailed(_) => "index_build_failed",
            RagError::RetrievalFailed(_) => "retrieval_failed",
            RagError::GenerationFailed(_) => "generation_failed",
        }
    }

    /// The source this error refers to, for per-item failures.
    pub fn source_ref(&self) -> Option<&str> {
        match self {
            RagError::InvalidSource { source_ref, .. }
            | RagError::DuplicateSource { source_ref, .. }
            | RagError::FetchFailed { source_ref, .. } => Some(source_ref),
            _ => None,
        }
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
