//! The assistant: one knowledge store plus the collaborators needed to fill
//! it and answer from it.
//!
//! This is the surface the CLI drives. It owns the store and hands out
//! sessions; each session is owned by its caller and passed back into
//! [`Assistant::ask`], so several sessions can share one store.

use anyhow::{Context, Result};
use deepknowledge_core::compose::{answer, ChatModel, GroundedAnswer};
use deepknowledge_core::embedding::Embedder;
use deepknowledge_core::models::{SourceKey, SourceKind};
use deepknowledge_core::session::ConversationSession;
use deepknowledge_core::store::KnowledgeStore;
use deepknowledge_core::RagError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::llm::create_chat_model;
use crate::loader::{
    load_documents, load_web, scan_directory, DocumentFile, HttpFetcher, LoadReport, PageFetcher,
};

/// Per-call outcome of adding sources.
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// Index version after the call.
    pub version: u64,
    /// Sources now in the knowledge base that were not before.
    pub added: Vec<SourceKey>,
    /// One entry per source that was not added, with the reason.
    pub failures: Vec<RagError>,
}

impl IngestSummary {
    pub fn merge(&mut self, other: IngestSummary) {
        self.version = self.version.max(other.version);
        self.added.extend(other.added);
        self.failures.extend(other.failures);
    }
}

pub struct Assistant {
    config: Config,
    store: KnowledgeStore,
    chat: Arc<dyn ChatModel>,
    fetcher: Arc<dyn PageFetcher>,
}

impl Assistant {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let store = KnowledgeStore::new(embedder, config.store_options());
        Self {
            config,
            store,
            chat,
            fetcher,
        }
    }

    /// Build the collaborators named by the configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding).context("Failed to create embedder")?;
        let chat = create_chat_model(&config.llm).context("Failed to create chat model")?;
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        Ok(Self::new(config, embedder, chat, fetcher))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// A fresh session, opened by the configured greeting if there is one.
    pub fn new_session(&self) -> ConversationSession {
        let greeting = self.config.session.greeting.trim();
        if greeting.is_empty() {
            ConversationSession::new()
        } else {
            ConversationSession::with_greeting(greeting)
        }
    }

    /// Every indexed source, sorted by kind then reference.
    pub fn list_knowledge_base(&self) -> Vec<SourceKey> {
        self.store.snapshot().sources()
    }

    /// Load the configured default websites and documents directory.
    pub async fn seed_defaults(&self) -> Result<IngestSummary, RagError> {
        let urls = self.config.knowledge.default_urls.clone();
        let mut summary = self.ingest_sources(&urls, &[]).await?;

        if let Some(dir) = self.config.knowledge.documents_dir.clone() {
            summary.merge(self.ingest_directory(&dir).await?);
        }
        Ok(summary)
    }

    /// Add websites and document files in one index publication.
    ///
    /// Sources already in the knowledge base are reported as
    /// [`RagError::DuplicateSource`] without being fetched. Only an index
    /// build failure aborts the call; every other problem is per item.
    pub async fn ingest_sources(
        &self,
        urls: &[String],
        files: &[PathBuf],
    ) -> Result<IngestSummary, RagError> {
        let documents: Vec<DocumentFile> = files.iter().map(DocumentFile::from_path).collect();
        self.ingest(urls, documents).await
    }

    /// Add every matching document under `dir`.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestSummary, RagError> {
        let documents = scan_directory(dir, &self.config.knowledge.include_globs).map_err(|e| {
            RagError::invalid_source(dir.display().to_string(), format!("{:#}", e))
        })?;
        self.ingest(&[], documents).await
    }

    async fn ingest(
        &self,
        urls: &[String],
        documents: Vec<DocumentFile>,
    ) -> Result<IngestSummary, RagError> {
        let mut skipped = Vec::new();

        let new_urls: Vec<String> = urls
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| self.keep_new(SourceKind::Website, u, &mut skipped))
            .collect();
        let new_documents: Vec<DocumentFile> = documents
            .into_iter()
            .filter(|d| self.keep_new(SourceKind::Document, &d.source_ref, &mut skipped))
            .collect();

        let mut loaded = load_web(
            &new_urls,
            self.fetcher.as_ref(),
            self.config.fetch.concurrency,
        )
        .await;
        if !new_documents.is_empty() {
            let max_tokens = self.config.chunking.max_tokens;
            let refs: Vec<String> = new_documents.iter().map(|d| d.source_ref.clone()).collect();
            match tokio::task::spawn_blocking(move || load_documents(&new_documents, max_tokens))
                .await
            {
                Ok(documents) => loaded.merge(documents),
                Err(e) => {
                    warn!(error = %e, files = refs.len(), "document loading task failed");
                    let reason = format!("document loading task failed: {}", e);
                    loaded.failures.extend(
                        refs.into_iter()
                            .map(|source_ref| RagError::fetch_failed(source_ref, &reason)),
                    );
                }
            }
        }
        let LoadReport { records, mut failures } = loaded;

        let report = self.store.ingest(records).await?;
        failures.extend(skipped);
        failures.extend(report.rejected);

        info!(
            version = report.version,
            added = report.added.len(),
            failed = failures.len(),
            "ingestion finished"
        );
        Ok(IngestSummary {
            version: report.version,
            added: report.added,
            failures,
        })
    }

    fn keep_new(&self, kind: SourceKind, source_ref: &str, skipped: &mut Vec<RagError>) -> bool {
        if self.store.contains(kind, source_ref) {
            skipped.push(RagError::DuplicateSource {
                kind,
                source_ref: source_ref.to_string(),
            });
            false
        } else {
            true
        }
    }

    /// Answer from the knowledge base with the session as memory.
    ///
    /// On success the question and answer are appended to `session`; on
    /// failure it is left exactly as it was.
    pub async fn ask(
        &self,
        session: &mut ConversationSession,
        question: &str,
    ) -> Result<GroundedAnswer, RagError> {
        let params = self.config.retrieval.params();
        let grounded = answer(
            question,
            session.turns(),
            &self.store,
            self.chat.as_ref(),
            &params,
        )
        .await?;
        session.record_exchange(question, grounded.answer.clone());
        Ok(grounded)
    }
}
