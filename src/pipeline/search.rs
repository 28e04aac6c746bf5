//! Text-to-image search: embed as query, rank in the store.

use crate::{
    embeddings::EmbeddingGateway,
    error::TransportError,
    store::{SearchHit, StoredRecord, VectorStore},
};

#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("search text is empty")]
    EmptyQuery,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A hit joined with the record it refers to.
#[derive(Debug, Clone)]
pub struct ResolvedHit {
    pub hit: SearchHit,
    /// `None` if the record vanished between search and lookup
    pub record: Option<StoredRecord>,
}

pub struct SearchPipeline<G, S> {
    gateway: G,
    store: S,
    candidate_pool: usize,
}

impl<G: EmbeddingGateway, S: VectorStore> SearchPipeline<G, S> {
    pub fn new(gateway: G, store: S, candidate_pool: usize) -> Self {
        Self {
            gateway,
            store,
            candidate_pool,
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

    /// Best `limit` matches for `query`, in the store's ranking order.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if limit == 0 {
            return Ok(vec![]);
        }

        let embedding = self
            .gateway
            .embed_query(query)
            .map_err(TransportError::from)?;

        // The index needs at least as many candidates as results
        let candidate_pool = self.candidate_pool.max(limit);
        log::debug!("vector search limit={limit} candidates={candidate_pool}");

        let hits = self
            .store
            .search(&embedding.vector, candidate_pool, limit)
            .map_err(TransportError::from)?;

        log::info!("query={query:?} hits={}", hits.len());
        Ok(hits)
    }

    /// Like [`search`](Self::search), with each hit's stored record attached.
    pub fn search_with_records(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ResolvedHit>, SearchError> {
        self.search(query, limit)?
            .into_iter()
            .map(|hit| -> Result<ResolvedHit, SearchError> {
                let record = self
                    .store
                    .find(&hit.file_name)
                    .map_err(TransportError::from)?;
                Ok(ResolvedHit { hit, record })
            })
            .collect()
    }
}
