//! The knowledge store: deduplicated records plus a searchable index.
//!
//! # Consistency model
//!
//! The store publishes an [`IndexSnapshot`] behind an `Arc`. Readers clone
//! the `Arc` and work against that version until they drop it. Writers
//! (`ingest`, `rebuild`) are serialized by an async mutex, build a complete
//! new snapshot off to the side, and swap it in with a single pointer write.
//! A failed build never reaches the swap, so the previous version stays
//! published untouched.
//!
//! # Incremental ingestion
//!
//! `ingest` only embeds passages of new records. Vectors of the current
//! snapshot are carried over, and the vector index is rebuilt over the
//! union (linear in corpus size). `rebuild` replaces the record set and
//! reuses any vector whose passage hash is already indexed.

mod snapshot;

pub use snapshot::{IndexSnapshot, Passage};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::chunk::{content_hash, split_text};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::{FlatIndexBuilder, VectorIndexBuilder};
use crate::models::{Record, SourceKey, SourceKind};

/// Indexing parameters.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Passage size budget, in approximate tokens.
    pub max_tokens: usize,
    /// Passages sent to the embedder per call.
    pub batch_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_tokens: 700,
            batch_size: 64,
        }
    }
}

/// Outcome of an `ingest` or `rebuild` call.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Version published by this call, or the unchanged current version
    /// when nothing new was accepted.
    pub version: u64,
    /// Sources newly added, sorted by kind then reference.
    pub added: Vec<SourceKey>,
    pub records_added: usize,
    /// Passages sent to the embedder.
    pub passages_embedded: usize,
    /// Passages whose vectors were carried over.
    pub passages_reused: usize,
    /// One [`RagError::DuplicateSource`] per rejected source.
    pub rejected: Vec<RagError>,
}

impl IngestReport {
    /// True when the call did not change the store.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty()
    }
}

/// Deduplicated record set with an atomically published vector index.
pub struct KnowledgeStore {
    embedder: Arc<dyn Embedder>,
    builder: Arc<dyn VectorIndexBuilder>,
    options: StoreOptions,
    current: RwLock<Arc<IndexSnapshot>>,
    writer: Mutex<()>,
}

impl KnowledgeStore {
    /// An empty store backed by a [`FlatIndex`](crate::index::FlatIndex).
    pub fn new(embedder: Arc<dyn Embedder>, options: StoreOptions) -> Self {
        Self::with_index_builder(embedder, Arc::new(FlatIndexBuilder), options)
    }

    pub fn with_index_builder(
        embedder: Arc<dyn Embedder>,
        builder: Arc<dyn VectorIndexBuilder>,
        options: StoreOptions,
    ) -> Self {
        let empty = IndexSnapshot::empty(embedder.model_name(), embedder.dims());
        Self {
            embedder,
            builder,
            options,
            current: RwLock::new(Arc::new(empty)),
            writer: Mutex::new(()),
        }
    }

    /// The embedder used for both indexing and queries.
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Distinct indexed source references, optionally restricted to one
    /// kind, in lexicographic order.
    pub fn list_sources(&self, kind: Option<SourceKind>) -> Vec<String> {
        self.snapshot().source_refs(kind)
    }

    pub fn contains(&self, kind: SourceKind, source_ref: &str) -> bool {
        self.snapshot().contains(&SourceKey {
            kind,
            source_ref: source_ref.to_string(),
        })
    }

    /// Append records and republish the index.
    ///
    /// Records whose source is already indexed, or whose id repeats within
    /// the batch, are rejected with [`RagError::DuplicateSource`] and
    /// reported; the rest are embedded and published together. Fails with
    /// [`RagError::IndexBuildFailed`] without touching the published state.
    pub async fn ingest(&self, records: Vec<Record>) -> Result<IngestReport> {
        let _writer = self.writer.lock().await;
        let base = self.snapshot();

        let admitted = admit(&base.records, records);
        if admitted.accepted.is_empty() {
            debug!(
                rejected = admitted.rejected.len(),
                version = base.version,
                "ingest accepted no new records"
            );
            return Ok(IngestReport {
                version: base.version,
                rejected: admitted.rejected,
                ..IngestReport::default()
            });
        }

        let records_added = admitted.accepted.len();
        let mut records = base.records.clone();
        let mut passages = base.passages.clone();
        let passages_reused = passages.len();
        let passages_embedded = self
            .append_records(&mut records, &mut passages, admitted.accepted, &HashMap::new())
            .await?
            .0;

        let snapshot = self.build(base.version + 1, records, passages)?;
        let version = self.publish(snapshot);
        Ok(IngestReport {
            version,
            added: admitted.added,
            records_added,
            passages_embedded,
            passages_reused,
            rejected: admitted.rejected,
        })
    }

    /// Replace the whole record set and republish the index.
    ///
    /// Passages whose text is already indexed keep their vectors; everything
    /// else is embedded. Duplicates inside `records` are rejected as in
    /// [`ingest`](Self::ingest).
    pub async fn rebuild(&self, records: Vec<Record>) -> Result<IngestReport> {
        let _writer = self.writer.lock().await;
        let base = self.snapshot();

        let admitted = admit(&[], records);
        let reusable: HashMap<&str, &Arc<Passage>> = base
            .passages
            .iter()
            .map(|p| (p.hash.as_str(), p))
            .collect();

        let records_added = admitted.accepted.len();
        let mut records = Vec::with_capacity(records_added);
        let mut passages = Vec::new();
        let (passages_embedded, passages_reused) = self
            .append_records(&mut records, &mut passages, admitted.accepted, &reusable)
            .await?;

        let snapshot = self.build(base.version + 1, records, passages)?;
        let version = self.publish(snapshot);
        Ok(IngestReport {
            version,
            added: admitted.added,
            records_added,
            passages_embedded,
            passages_reused,
            rejected: admitted.rejected,
        })
    }

    /// Split `new_records` into passages, embed what `reusable` cannot
    /// supply, and append records and passages to the working set.
    ///
    /// Returns `(embedded, reused)` passage counts for the new records.
    async fn append_records(
        &self,
        records: &mut Vec<Arc<Record>>,
        passages: &mut Vec<Arc<Passage>>,
        new_records: Vec<Record>,
        reusable: &HashMap<&str, &Arc<Passage>>,
    ) -> Result<(usize, usize)> {
        // (passage, needs embedding)
        let mut staged: Vec<(Passage, bool)> = Vec::new();
        for record in new_records {
            let record_pos = records.len();
            for text in split_text(&record.text, self.options.max_tokens) {
                let hash = content_hash(&text);
                let known = reusable.get(hash.as_str()).map(|p| p.vector.clone());
                let needs_embedding = known.is_none();
                staged.push((
                    Passage {
                        record: record_pos,
                        text,
                        hash,
                        vector: known.unwrap_or_default(),
                    },
                    needs_embedding,
                ));
            }
            records.push(Arc::new(record));
        }

        let texts: Vec<String> = staged
            .iter()
            .filter(|(_, needs)| *needs)
            .map(|(p, _)| p.text.clone())
            .collect();
        let embedded = texts.len();
        let reused = staged.len() - embedded;
        let mut vectors = self.embed_all(&texts).await?.into_iter();

        for (mut passage, needs) in staged {
            if needs {
                passage.vector = vectors.next().unwrap_or_default();
            }
            passages.push(Arc::new(passage));
        }
        Ok((embedded, reused))
    }

    /// Embed `texts` in batches, validating count and dimensionality.
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let expected_dims = self.embedder.dims();
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.options.batch_size.max(1)) {
            let vectors = self
                .embedder
                .embed(batch)
                .await
                .map_err(|e| RagError::IndexBuildFailed(format!("{:#}", e)))?;
            if vectors.len() != batch.len() {
                return Err(RagError::IndexBuildFailed(format!(
                    "embedder returned {} vectors for {} passages",
                    vectors.len(),
                    batch.len()
                )));
            }
            for v in &vectors {
                if v.is_empty() || (expected_dims > 0 && v.len() != expected_dims) {
                    return Err(RagError::IndexBuildFailed(format!(
                        "embedding has {} dimensions, expected {}",
                        v.len(),
                        expected_dims
                    )));
                }
            }
            out.extend(vectors);
        }
        Ok(out)
    }

    fn build(
        &self,
        version: u64,
        records: Vec<Arc<Record>>,
        passages: Vec<Arc<Passage>>,
    ) -> Result<IndexSnapshot> {
        let index = if passages.is_empty() {
            None
        } else {
            let vectors = passages.iter().map(|p| p.vector.clone()).collect();
            Some(
                self.builder
                    .build(vectors)
                    .map_err(|e| RagError::IndexBuildFailed(format!("{:#}", e)))?,
            )
        };
        let dims = index
            .as_ref()
            .map(|i| i.dims())
            .unwrap_or_else(|| self.embedder.dims());

        Ok(IndexSnapshot {
            version,
            records,
            passages,
            index,
            model: self.embedder.model_name().to_string(),
            dims,
        })
    }

    fn publish(&self, snapshot: IndexSnapshot) -> u64 {
        let version = snapshot.version;
        info!(
            version,
            records = snapshot.records.len(),
            passages = snapshot.passages.len(),
            "published knowledge index"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        version
    }
}

struct Admitted {
    accepted: Vec<Record>,
    added: Vec<SourceKey>,
    rejected: Vec<RagError>,
}

/// Split a batch into records to index and duplicate sources to reject.
fn admit(existing: &[Arc<Record>], batch: Vec<Record>) -> Admitted {
    let known: HashSet<SourceKey> = existing.iter().map(|r| r.key()).collect();
    let mut ids: HashSet<String> = existing.iter().map(|r| r.id.clone()).collect();
    let mut added = BTreeSet::new();
    let mut reported = HashSet::new();
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for record in batch {
        let key = record.key();
        if known.contains(&key) || !ids.insert(record.id.clone()) {
            if reported.insert(key.clone()) {
                rejected.push(RagError::DuplicateSource {
                    kind: key.kind,
                    source_ref: key.source_ref,
                });
            }
            continue;
        }
        added.insert(key);
        accepted.push(record);
    }

    Admitted {
        accepted,
        added: added.into_iter().collect(),
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Embeds by letter frequency over a-z; fails on demand.
    struct LetterEmbedder {
        fail: AtomicBool,
        calls: AtomicUsize,
        embedded: AtomicUsize,
    }

    impl LetterEmbedder {
        fn new() -> Self {
            Self {
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                embedded: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }

        fn dims(&self) -> usize {
            26
        }

        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                bail!("quota exceeded");
            }
            self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                        v[(c - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    fn store_with(embedder: Arc<LetterEmbedder>) -> KnowledgeStore {
        KnowledgeStore::new(embedder, StoreOptions::default())
    }

    #[tokio::test]
    async fn test_ingest_lists_sorted_distinct_sources() {
        let store = store_with(Arc::new(LetterEmbedder::new()));
        let report = store
            .ingest(vec![
                Record::website("https://b.example/", "bees"),
                Record::document("a.pdf", 0, "apples"),
                Record::document("a.pdf", 1, "apricots"),
            ])
            .await
            .unwrap();

        assert_eq!(report.version, 1);
        assert_eq!(report.records_added, 3);
        assert_eq!(report.added.len(), 2);
        assert_eq!(
            store.list_sources(None),
            vec!["a.pdf".to_string(), "https://b.example/".to_string()]
        );
        assert_eq!(store.list_sources(Some(SourceKind::Document)), vec!["a.pdf"]);
    }

    #[tokio::test]
    async fn test_duplicate_source_rejected_without_rebuild() {
        let embedder = Arc::new(LetterEmbedder::new());
        let store = store_with(embedder.clone());
        store
            .ingest(vec![Record::website("https://a.example/x", "first")])
            .await
            .unwrap();
        let calls = embedder.calls.load(Ordering::SeqCst);

        let report = store
            .ingest(vec![Record::website("https://a.example/x", "second")])
            .await
            .unwrap();

        assert!(report.is_unchanged());
        assert_eq!(report.version, 1);
        assert!(matches!(
            report.rejected.as_slice(),
            [RagError::DuplicateSource { kind: SourceKind::Website, .. }]
        ));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);
        assert_eq!(store.list_sources(None), vec!["https://a.example/x"]);
    }

    #[tokio::test]
    async fn test_same_ref_different_kind_is_not_duplicate() {
        let store = store_with(Arc::new(LetterEmbedder::new()));
        store
            .ingest(vec![Record::website("shared", "web text")])
            .await
            .unwrap();
        let report = store
            .ingest(vec![Record::document("shared", 0, "doc text")])
            .await
            .unwrap();
        assert!(report.rejected.is_empty());
        assert_eq!(store.list_sources(None), vec!["shared"]);
        assert_eq!(store.snapshot().sources().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_within_batch_reported_once() {
        let store = store_with(Arc::new(LetterEmbedder::new()));
        let report = store
            .ingest(vec![
                Record::website("https://a.example/x", "one"),
                Record::website("https://a.example/x", "two"),
                Record::website("https://a.example/x", "three"),
            ])
            .await
            .unwrap();
        assert_eq!(report.records_added, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(store.snapshot().record_count(), 1);
    }

    #[tokio::test]
    async fn test_incremental_ingest_embeds_only_new_passages() {
        let embedder = Arc::new(LetterEmbedder::new());
        let store = store_with(embedder.clone());
        store
            .ingest(vec![
                Record::website("https://a.example/", "alpha"),
                Record::website("https://b.example/", "beta"),
            ])
            .await
            .unwrap();
        assert_eq!(embedder.embedded.load(Ordering::SeqCst), 2);

        let report = store
            .ingest(vec![Record::website("https://c.example/", "gamma")])
            .await
            .unwrap();
        assert_eq!(embedder.embedded.load(Ordering::SeqCst), 3);
        assert_eq!(report.passages_embedded, 1);
        assert_eq!(report.passages_reused, 2);
        assert_eq!(store.snapshot().passage_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_build_leaves_state_untouched() {
        let embedder = Arc::new(LetterEmbedder::new());
        let store = store_with(embedder.clone());
        store
            .ingest(vec![Record::website("https://a.example/", "alpha")])
            .await
            .unwrap();
        let before = store.snapshot();

        embedder.fail.store(true, Ordering::SeqCst);
        let err = store
            .ingest(vec![Record::website("https://b.example/", "beta")])
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::IndexBuildFailed(_)));
        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(store.list_sources(None), vec!["https://a.example/"]);
    }

    #[tokio::test]
    async fn test_reader_keeps_pinned_version() {
        let store = store_with(Arc::new(LetterEmbedder::new()));
        store
            .ingest(vec![Record::website("https://a.example/", "alpha")])
            .await
            .unwrap();
        let pinned = store.snapshot();

        store
            .ingest(vec![Record::website("https://b.example/", "beta")])
            .await
            .unwrap();

        assert_eq!(pinned.version(), 1);
        assert_eq!(pinned.record_count(), 1);
        assert_eq!(store.version(), 2);
        assert_eq!(store.snapshot().record_count(), 2);
    }

    #[tokio::test]
    async fn test_rebuild_reuses_known_passages() {
        let embedder = Arc::new(LetterEmbedder::new());
        let store = store_with(embedder.clone());
        store
            .ingest(vec![
                Record::website("https://a.example/", "alpha"),
                Record::website("https://b.example/", "beta"),
            ])
            .await
            .unwrap();

        let report = store
            .rebuild(vec![
                Record::website("https://a.example/", "alpha"),
                Record::website("https://d.example/", "delta"),
            ])
            .await
            .unwrap();

        assert_eq!(report.passages_reused, 1);
        assert_eq!(report.passages_embedded, 1);
        assert_eq!(
            store.list_sources(None),
            vec!["https://a.example/", "https://d.example/"]
        );
        assert_eq!(store.version(), 2);
    }

    #[tokio::test]
    async fn test_long_record_split_into_passages() {
        let store = KnowledgeStore::new(
            Arc::new(LetterEmbedder::new()),
            StoreOptions {
                max_tokens: 5,
                batch_size: 2,
            },
        );
        let text = "first para one\n\nsecond para two\n\nthird para three";
        store
            .ingest(vec![Record::website("https://a.example/", text)])
            .await
            .unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.passage_count(), 3);
        for p in snapshot.passages() {
            assert_eq!(snapshot.record_of(p).source_ref, "https://a.example/");
        }
    }

    #[tokio::test]
    async fn test_empty_store_state() {
        let store = store_with(Arc::new(LetterEmbedder::new()));
        assert!(store.is_empty());
        assert_eq!(store.version(), 0);
        assert!(store.list_sources(None).is_empty());
        assert_eq!(store.snapshot().model(), "letters");
    }
}
