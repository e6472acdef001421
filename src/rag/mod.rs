//! Knowledge store and document ingestion.
//!
//! This module provides:
//! - `KnowledgeStore` / `SqliteRagStore`: persisted chunks with cosine search
//! - `KnowledgeBase`: a store paired with its embedder, gated for rebuilds
//! - `IngestionPipeline`: PDF extraction, chunking and index replacement

mod chunker;
mod error;
mod ingest;
mod knowledge;
mod sqlite;
mod store;

pub use chunker::{ChunkerConfig, TextChunk, TextChunker};
pub use error::KnowledgeError;
pub use ingest::{IngestError, IngestReport, IngestionPipeline, SkippedDocument, SourceDocument};
pub use knowledge::KnowledgeBase;
pub use sqlite::SqliteRagStore;
pub use store::{ChunkSearchResult, KnowledgeStore, StoredChunk};
