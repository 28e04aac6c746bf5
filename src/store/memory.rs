//! In-memory vector store with cosine similarity search.

use super::{SearchHit, StoreError, StoredRecord, VectorStore};

/// Records kept in insertion order.
///
/// The vector dimension is fixed by the first insert.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    records: Vec<StoredRecord>,
    dimensions: Option<usize>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose records must have `dimensions` entries.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            records: Vec::new(),
            dimensions: Some(dimensions),
        }
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn records(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.iter()
    }

    /// Validate a vector against this store without inserting it.
    pub fn check(&self, vector: &[f32]) -> Result<(), StoreError> {
        if let Some(expected) = self.dimensions {
            if vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
        }

        if vector.is_empty() || l2_norm(vector) < f32::EPSILON {
            return Err(StoreError::ZeroNormVector);
        }

        Ok(())
    }
}

impl VectorStore for MemoryVectorStore {
    fn insert(&mut self, record: StoredRecord) -> Result<(), StoreError> {
        self.check(&record.embedding)?;
        self.dimensions.get_or_insert(record.embedding.len());
        self.records.push(record);
        Ok(())
    }

    fn search(
        &self,
        vector: &[f32],
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        if candidate_pool < limit {
            return Err(StoreError::InvalidQuery(format!(
                "candidate pool ({candidate_pool}) must not be smaller than limit ({limit})"
            )));
        }
        if limit == 0 || self.records.is_empty() {
            return Ok(vec![]);
        }

        self.check(vector)?;
        let query_norm = l2_norm(vector);

        let mut hits: Vec<SearchHit> = self
            .records
            .iter()
            .map(|record| SearchHit {
                file_name: record.file_name.clone(),
                score: relevance(vector, &record.embedding, query_norm),
            })
            .collect();

        // Stable sort: ties keep insertion order
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Exact scan: every record is a candidate, so the pool only bounds `limit`
        hits.truncate(limit);

        Ok(hits)
    }

    fn find(&self, file_name: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .find(|record| record.file_name == file_name)
            .cloned())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity mapped onto [0, 1].
fn relevance(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    let cosine = (dot_product / (query_norm * target_norm)).clamp(-1.0, 1.0);
    (1.0 + cosine) / 2.0
}
