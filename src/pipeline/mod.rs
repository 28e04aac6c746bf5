//! Ingest and search workflows built from the encoder, gateway and store.

pub mod ingest;
pub mod search;
pub mod source;

pub use ingest::{IngestError, IngestEvent, IngestionPipeline};
pub use search::{ResolvedHit, SearchError, SearchPipeline};
pub use source::DirectorySource;
