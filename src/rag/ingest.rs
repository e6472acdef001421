//! Rebuilds the knowledge store from the PDFs in the data directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use super::chunker::{ChunkerConfig, TextChunk, TextChunker};
use super::error::KnowledgeError;
use super::knowledge::KnowledgeBase;
use super::store::StoredChunk;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("an ingestion run is already in progress")]
    AlreadyRunning,

    #[error("cannot read data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedDocument {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedDocument>,
    /// False when nothing usable was found and the previous index was kept.
    pub replaced: bool,
}

/// Extracted text of one source document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

pub struct IngestionPipeline {
    knowledge: Arc<KnowledgeBase>,
    data_dir: PathBuf,
    chunker: TextChunker,
    batch_size: usize,
    running: AtomicBool,
}

/// Clears the running flag when an ingestion run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl IngestionPipeline {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        data_dir: PathBuf,
        chunker: ChunkerConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            knowledge,
            data_dir,
            chunker: TextChunker::new(chunker),
            batch_size: batch_size.max(1),
            running: AtomicBool::new(false),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<RunGuard<'_>, IngestError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IngestError::AlreadyRunning)?;
        Ok(RunGuard(&self.running))
    }

    /// Scans the data directory, extracts every PDF and replaces the index.
    ///
    /// With no PDFs present the store is left untouched.
    pub async fn run(&self) -> Result<IngestReport, IngestError> {
        let _guard = self.begin()?;

        let pdfs = find_pdfs(&self.data_dir)?;
        if pdfs.is_empty() {
            tracing::warn!("No PDF documents found in {}", self.data_dir.display());
            return Ok(IngestReport::default());
        }
        tracing::info!("Loading {} PDF document(s) from {}", pdfs.len(), self.data_dir.display());

        let mut documents = Vec::with_capacity(pdfs.len());
        let mut skipped = Vec::new();
        for path in pdfs {
            match extract_pdf(path.clone()).await {
                Ok(document) => documents.push(document),
                Err(reason) => {
                    tracing::warn!("Skipping {}: {}", path.display(), reason);
                    skipped.push(SkippedDocument {
                        path: path.display().to_string(),
                        reason,
                    });
                }
            }
        }

        let mut report = self.index_documents(documents).await?;
        report.skipped.extend(skipped);
        Ok(report)
    }

    async fn index_documents(
        &self,
        documents: Vec<SourceDocument>,
    ) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();
        let mut chunks: Vec<TextChunk> = Vec::new();

        for document in documents {
            let text = normalize_whitespace(&document.text);
            let pieces = self.chunker.split(&text, &document.name);
            if pieces.is_empty() {
                report.skipped.push(SkippedDocument {
                    path: document.name,
                    reason: "no extractable text".to_string(),
                });
                continue;
            }
            report.documents += 1;
            chunks.extend(pieces);
        }

        if chunks.is_empty() {
            tracing::warn!("No text could be extracted; keeping the existing index");
            return Ok(report);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.knowledge.embed_all(&texts, self.batch_size).await?;

        let items: Vec<(StoredChunk, Vec<f32>)> = chunks
            .into_iter()
            .map(to_stored_chunk)
            .zip(vectors)
            .collect();
        report.chunks = items.len();

        self.knowledge.replace_all(items).await?;
        report.replaced = true;

        tracing::info!(
            "Indexed {} chunk(s) from {} document(s)",
            report.chunks,
            report.documents
        );
        Ok(report)
    }

    /// Indexes already-extracted documents, with the same exclusivity as `run`.
    pub async fn ingest_documents(
        &self,
        documents: Vec<SourceDocument>,
    ) -> Result<IngestReport, IngestError> {
        let _guard = self.begin()?;
        self.index_documents(documents).await
    }
}

fn find_pdfs(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut pdfs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| IngestError::DataDir {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_pdf = entry
            .path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf {
            pdfs.push(entry.into_path());
        }
    }
    Ok(pdfs)
}

async fn extract_pdf(path: PathBuf) -> Result<SourceDocument, String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let text = tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path).map_err(|e| format!("read failed: {}", e))?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| format!("extraction failed: {}", e))
    })
    .await
    .map_err(|e| format!("extraction aborted: {}", e))??;

    Ok(SourceDocument { name, text })
}

fn normalize_whitespace(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

    let spaces = SPACES.get_or_init(|| Regex::new(r"[ \t\u{00A0}]+").expect("Invalid regex"));
    let blank_lines = BLANK_LINES.get_or_init(|| Regex::new(r"\n\s*\n").expect("Invalid regex"));

    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let normalized = spaces.replace_all(&normalized, " ");
    let normalized = blank_lines.replace_all(&normalized, "\n\n");
    normalized.trim().to_string()
}

fn to_stored_chunk(chunk: TextChunk) -> StoredChunk {
    let mut hasher = Sha256::new();
    hasher.update(chunk.source.as_bytes());
    hasher.update(chunk.chunk_index.to_le_bytes());
    hasher.update(chunk.text.as_bytes());
    let chunk_id = hex::encode(hasher.finalize());

    StoredChunk {
        chunk_id,
        content: chunk.text,
        source: chunk.source,
        chunk_index: chunk.chunk_index,
        metadata: Some(json!({ "start_offset": chunk.start_offset })),
    }
}
