//! Core data models shared by the loader, store, retriever, and composer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a [`Record`] came from.
///
/// Carried on every record from creation; nothing downstream infers the
/// kind from the shape of the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Website,
    Document,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Website => "website",
            SourceKind::Document => "document",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            SourceKind::Website => "Website",
            SourceKind::Document => "Document",
        })
    }
}

/// Identity of an ingested source. Two records with the same key belong to
/// the same source; a store never indexes the same key twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    pub kind: SourceKind,
    pub source_ref: String,
}

/// One ingested unit of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Stable identifier: the URL for websites, `file#index` for document chunks.
    pub id: String,
    /// Extracted plain text.
    pub text: String,
    pub kind: SourceKind,
    /// Original URL or original file name.
    pub source_ref: String,
    /// Page title or file name, when known.
    pub title: Option<String>,
}

impl Record {
    /// A website record: one per URL, identified by the URL itself.
    pub fn website(url: impl Into<String>, text: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            text: text.into(),
            kind: SourceKind::Website,
            source_ref: url,
            title: None,
        }
    }

    /// A document record for chunk `index` of `file_name`.
    pub fn document(file_name: impl Into<String>, index: usize, text: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            id: format!("{}#{}", file_name, index),
            text: text.into(),
            kind: SourceKind::Document,
            title: Some(file_name.clone()),
            source_ref: file_name,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn key(&self) -> SourceKey {
        SourceKey {
            kind: self.kind,
            source_ref: self.source_ref.clone(),
        }
    }
}

/// One retrieval result. Serialized verbatim into the model's context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    /// Cosine similarity, clamped to `[0.0, 1.0]`.
    pub score: f64,
    /// Provenance: URL or file name of the originating record.
    #[serde(rename = "source")]
    pub source_ref: String,
    pub kind: SourceKind,
    /// Passage text placed in the prompt.
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation turn, also the unit sent to the chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
