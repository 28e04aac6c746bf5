//! Embedding generation for images and search queries.
//!
//! The embedding model is asymmetric: stored images are embedded as
//! documents, search text as queries. Both land in the same vector space but
//! go through different paths on the provider side, so callers must pick
//! the matching method.

pub mod voyage;

use serde::{Deserialize, Serialize};

use crate::images::EncodedPayload;

pub use voyage::VoyageClient;

/// Default multimodal embedding model
pub const DEFAULT_MODEL: &str = "voyage-multimodal-3.5";

/// Which side of the retrieval the input is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Document,
    Query,
}

/// A fixed-length embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub input_type: InputType,
}

impl Embedding {
    pub fn new(vector: Vec<f32>, input_type: InputType) -> Self {
        Self { vector, input_type }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("nothing to embed")]
    EmptyInput,
}

/// Produces embeddings for stored images and for search text.
pub trait EmbeddingGateway {
    /// Embed an encoded image for storage.
    fn embed_document(&self, payload: &EncodedPayload) -> Result<Embedding, GatewayError>;

    /// Embed search text.
    fn embed_query(&self, text: &str) -> Result<Embedding, GatewayError>;
}
