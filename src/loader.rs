//! Turning websites and document files into [`Record`]s.
//!
//! Every function here fails per item: a bad URL or an unreadable file
//! becomes an entry in [`LoadReport::failures`] while its siblings load
//! normally. Whether partial success counts as success is the caller's call.
//!
//! A source repeated within one batch loads once; each repeat is reported
//! as [`RagError::DuplicateSource`].
//!
//! - Websites: validated, deduplicated, fetched with bounded concurrency,
//!   converted from HTML to text. One Record per URL, `sourceRef` = the URL.
//! - Documents: text extracted by format, split at paragraph boundaries into
//!   `max_tokens`-sized Records, `sourceRef` = the file name.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use deepknowledge_core::chunk::split_text;
use deepknowledge_core::models::{Record, SourceKind};
use deepknowledge_core::RagError;
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use crate::config::FetchConfig;
use crate::extract::{extract_file, ExtractError};
use crate::html::{html_to_text, page_title};

/// Records that loaded, and one error per item that did not.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<Record>,
    pub failures: Vec<RagError>,
}

impl LoadReport {
    fn push(&mut self, outcome: std::result::Result<Vec<Record>, RagError>) {
        match outcome {
            Ok(records) => self.records.extend(records),
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    source = e.source_ref().unwrap_or(""),
                    error = %e,
                    "source skipped"
                );
                self.failures.push(e);
            }
        }
    }

    pub fn merge(&mut self, other: LoadReport) {
        self.records.extend(other.records);
        self.failures.extend(other.failures);
    }
}

// ============ Websites ============

/// Accept absolute http(s) URLs whose host is a dotted domain name ending
/// in an alphabetic top-level label of at least two letters.
pub fn validate_url(raw: &str) -> std::result::Result<Url, RagError> {
    let raw = raw.trim();
    let invalid = |reason: &str| RagError::invalid_source(raw, reason);

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs are supported"));
    }
    let host = match url.host() {
        Some(url::Host::Domain(host)) => host,
        _ => return Err(invalid("URL must name a domain")),
    };
    let mut labels = host.rsplit('.');
    let tld = labels.next().unwrap_or_default();
    if labels.next().is_none() {
        return Err(invalid("domain has no top-level label"));
    }
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid("top-level domain must be alphabetic"));
    }
    if host.split('.').any(str::is_empty) {
        return Err(invalid("domain has an empty label"));
    }
    Ok(url)
}

/// Retrieves the raw HTML of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`PageFetcher`] over HTTP GET.
///
/// Retries 429, 5xx, and transport errors with exponential backoff; any
/// other non-2xx status fails immediately. Bodies larger than
/// `max_body_bytes` are rejected.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
    max_retries: u32,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
            max_retries: config.max_retries,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchOutcome> {
        let mut response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Ok(FetchOutcome::Retry(anyhow!("request failed: {}", e))),
        };

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Ok(FetchOutcome::Retry(anyhow!("HTTP {}", status)));
        }
        if !status.is_success() {
            bail!("HTTP {}", status);
        }
        if let Some(len) = response.content_length() {
            if len as usize > self.max_body_bytes {
                bail!("page is {} bytes, limit is {}", len, self.max_body_bytes);
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                bail!("page exceeds {} bytes", self.max_body_bytes);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(FetchOutcome::Body(String::from_utf8_lossy(&body).into_owned()))
    }
}

enum FetchOutcome {
    Body(String),
    Retry(anyhow::Error),
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut last_err = anyhow!("no attempt made");
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(url, attempt, delay_secs = delay.as_secs(), "retrying page fetch");
                tokio::time::sleep(delay).await;
            }
            match self.fetch_once(url).await? {
                FetchOutcome::Body(body) => return Ok(body),
                FetchOutcome::Retry(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

/// Fetch each URL and convert it to a Website record.
///
/// Invalid URLs fail without a request; repeated URLs are fetched once
/// and each repeat is reported as a duplicate.
/// At most `concurrency` requests are in flight, and records come back in
/// the order their URLs were given.
pub async fn load_web(
    urls: &[String],
    fetcher: &dyn PageFetcher,
    concurrency: usize,
) -> LoadReport {
    let mut report = LoadReport::default();
    let mut seen = HashSet::new();
    let mut pending = Vec::new();

    for raw in urls {
        let source_ref = raw.trim().to_string();
        if !seen.insert(source_ref.clone()) {
            report.push(Err(duplicate(SourceKind::Website, source_ref)));
            continue;
        }
        match validate_url(&source_ref) {
            Ok(_) => pending.push(source_ref),
            Err(e) => report.push(Err(e)),
        }
    }

    let outcomes: Vec<_> = stream::iter(pending)
        .map(|url| async move { load_page(&url, fetcher).await })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    for outcome in outcomes {
        report.push(outcome.map(|record| vec![record]));
    }
    report
}

async fn load_page(url: &str, fetcher: &dyn PageFetcher) -> std::result::Result<Record, RagError> {
    let html = fetcher
        .fetch(url)
        .await
        .map_err(|e| RagError::fetch_failed(url, format!("{:#}", e)))?;

    let text = html_to_text(&html);
    if text.trim().is_empty() {
        return Err(RagError::fetch_failed(url, "page has no readable text"));
    }
    debug!(url, chars = text.len(), "page loaded");

    let record = Record::website(url, text);
    Ok(match page_title(&html) {
        Some(title) => record.with_title(title),
        None => record,
    })
}

// ============ Documents ============

/// A document on disk and the reference it is indexed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub path: PathBuf,
    pub source_ref: String,
}

impl DocumentFile {
    /// Reference a file by its file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source_ref = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, source_ref }
    }
}

/// Extract and split each document. Blocking; run off the async runtime.
pub fn load_documents(files: &[DocumentFile], max_tokens: usize) -> LoadReport {
    let mut report = LoadReport::default();
    let mut seen = HashSet::new();
    for file in files {
        if !seen.insert(file.source_ref.as_str()) {
            report.push(Err(duplicate(SourceKind::Document, file.source_ref.clone())));
            continue;
        }
        report.push(load_document(file, max_tokens));
    }
    report
}

fn duplicate(kind: SourceKind, source_ref: String) -> RagError {
    RagError::DuplicateSource { kind, source_ref }
}

fn load_document(
    file: &DocumentFile,
    max_tokens: usize,
) -> std::result::Result<Vec<Record>, RagError> {
    let text = extract_file(&file.path).map_err(|e| {
        if matches!(e, ExtractError::Unsupported(_)) {
            RagError::invalid_source(&file.source_ref, e.to_string())
        } else {
            RagError::fetch_failed(&file.source_ref, e)
        }
    })?;

    let chunks = split_text(&text, max_tokens);
    if chunks.is_empty() {
        return Err(RagError::fetch_failed(&file.source_ref, "document has no extractable text"));
    }
    debug!(file = %file.source_ref, records = chunks.len(), "document loaded");

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| Record::document(&file.source_ref, i, chunk))
        .collect())
}

/// Recursively list files under `root` matching any include glob.
///
/// References are paths relative to `root` with `/` separators, so files
/// with the same name in different folders stay distinct. Hidden
/// directories and common build output are skipped.
pub fn scan_directory(root: &Path, include_globs: &[String]) -> Result<Vec<DocumentFile>> {
    if !root.is_dir() {
        bail!("Documents directory does not exist: {}", root.display());
    }

    let include_set = build_globset(include_globs)?;
    let exclude_set = build_globset(&[
        "**/.*/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ])?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push(DocumentFile {
            path: path.to_path_buf(),
            source_ref: rel_str,
        });
    }

    files.sort_by(|a, b| a.source_ref.cmp(&b.source_ref));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
