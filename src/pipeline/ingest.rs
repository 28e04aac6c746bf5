//! Directory ingestion: encode, embed as document, store.

use std::path::PathBuf;

use chrono::Utc;

use crate::{
    embeddings::EmbeddingGateway,
    error::{FileError, TransportError},
    images::{self, EncodeLimits, EncodedPayload},
    pipeline::source::{Candidate, DirectorySource},
    store::{RecordMetadata, StoredRecord, VectorStore},
};

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("cannot list {}: {source}", dir.display())]
    Source {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Progress notifications, one or more per candidate file.
#[derive(Debug)]
pub enum IngestEvent<'a> {
    Resized {
        file_name: &'a str,
        width: u32,
        height: u32,
    },
    Indexed {
        file_name: &'a str,
    },
    Failed {
        file_name: &'a str,
        error: &'a FileError,
    },
}

/// Outcome of a completed run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub indexed: Vec<String>,
    pub failed: Vec<(String, FileError)>,
}

pub struct IngestionPipeline<G, S> {
    gateway: G,
    store: S,
    limits: EncodeLimits,
}

impl<G: EmbeddingGateway, S: VectorStore> IngestionPipeline<G, S> {
    pub fn new(gateway: G, store: S, limits: EncodeLimits) -> Self {
        Self {
            gateway,
            store,
            limits,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn run(&mut self, source: &DirectorySource) -> Result<IngestReport, IngestError> {
        self.run_with(source, |_| {})
    }

    /// Ingest every candidate of `source`, reporting progress to `on_event`.
    ///
    /// Unreadable or undecodable files are recorded in the report and
    /// skipped. Embedding or store failures abort the run.
    pub fn run_with(
        &mut self,
        source: &DirectorySource,
        mut on_event: impl FnMut(IngestEvent),
    ) -> Result<IngestReport, IngestError> {
        let _span = tracing::info_span!("ingest", dir = %source.dir().display()).entered();

        let candidates = source.candidates().map_err(|source_err| IngestError::Source {
            dir: source.dir().to_path_buf(),
            source: source_err,
        })?;
        log::info!("Found {} candidate images", candidates.len());

        let mut report = IngestReport::default();
        for candidate in candidates {
            let payload = match self.prepare(&candidate) {
                Ok(payload) => payload,
                Err(error) => {
                    log::warn!("skipping file={} err={error}", candidate.file_name);
                    on_event(IngestEvent::Failed {
                        file_name: &candidate.file_name,
                        error: &error,
                    });
                    report.failed.push((candidate.file_name, error));
                    continue;
                }
            };

            if payload.was_resized {
                on_event(IngestEvent::Resized {
                    file_name: &candidate.file_name,
                    width: payload.dimensions.0,
                    height: payload.dimensions.1,
                });
            }

            self.index(&candidate, payload)?;
            on_event(IngestEvent::Indexed {
                file_name: &candidate.file_name,
            });
            report.indexed.push(candidate.file_name);
        }

        log::info!(
            "Ingestion finished: indexed={} failed={}",
            report.indexed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn prepare(&self, candidate: &Candidate) -> Result<EncodedPayload, FileError> {
        let asset = images::open(&candidate.path)?;
        log::debug!(
            "decoded file={} size={}x{} bytes={}",
            candidate.file_name,
            asset.width(),
            asset.height(),
            asset.source_len
        );
        Ok(images::encode(asset, self.limits)?)
    }

    fn index(&mut self, candidate: &Candidate, payload: EncodedPayload) -> Result<(), TransportError> {
        let embedding = self.gateway.embed_document(&payload)?;
        log::debug!(
            "embedded file={} quality={} attempts={} dims={}",
            candidate.file_name,
            payload.quality,
            payload.attempts,
            embedding.dimensions()
        );
        drop(payload);

        self.store.insert(StoredRecord {
            file_name: candidate.file_name.clone(),
            embedding: embedding.into_vector(),
            metadata: RecordMetadata {
                path: candidate.path.to_string_lossy().into_owned(),
                ingested_at: Utc::now(),
            },
        })?;
        Ok(())
    }
}
