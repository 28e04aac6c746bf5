use crate::{
    embeddings::GatewayError,
    images::{DecodeError, EncodeError},
    store::StoreError,
};

/// A problem with one source file. The file is skipped, the run goes on.
#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Encode(#[from] EncodeError),
}

/// A failing collaborator. Ends the whole operation.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("embedding service: {0}")]
    Gateway(#[from] GatewayError),

    #[error("vector store: {0}")]
    Store(#[from] StoreError),
}
