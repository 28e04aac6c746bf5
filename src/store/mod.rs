//! Persistence and nearest-neighbour lookup for image embeddings.
//!
//! # Architecture
//!
//! - `memory`: in-memory records with cosine similarity search
//! - `file`: append-only `records.bin` log replayed into a memory store

mod file;
mod memory;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use file::FileVectorStore;
pub use memory::MemoryVectorStore;

/// Default number of candidates examined per search
pub const DEFAULT_CANDIDATE_POOL: usize = 100;

/// Extra fields stored next to a vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordMetadata {
    /// Path of the source image at ingestion time
    pub path: String,
    pub ingested_at: DateTime<Utc>,
}

/// One ingested image.
///
/// `file_name` is not a key: storing the same name twice keeps both records.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub file_name: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A search result, ordered by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub file_name: String,
    /// Relevance in [0, 1], higher is more similar
    pub score: f32,
}

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// A document store with a vector index over the embedding field.
pub trait VectorStore {
    /// Append a record. Never replaces an existing one.
    fn insert(&mut self, record: StoredRecord) -> Result<(), StoreError>;

    /// Nearest neighbours of `vector`.
    ///
    /// Returns up to `limit` hits, best first. `candidate_pool` is how many
    /// candidates an approximate index considers before ranking and must be
    /// at least `limit`.
    fn search(
        &self,
        vector: &[f32],
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;

    /// First record stored under `file_name`.
    fn find(&self, file_name: &str) -> Result<Option<StoredRecord>, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
