use async_trait::async_trait;

use crate::domain::error::ZiriError;
use crate::domain::models::Chunk;

/// Result of `validate_index`: reports issues without mutating state
/// (spec §4.M).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub record_count: usize,
    pub index_count: usize,
    pub duplicate_chunk_ids: Vec<String>,
    pub out_of_range_vector_ids: Vec<u32>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.record_count == self.index_count
            && self.duplicate_chunk_ids.is_empty()
            && self.out_of_range_vector_ids.is_empty()
    }
}

/// Durable mapping of vector position to chunk record (spec §4.M).
///
/// Writes are append-only during indexing and fully rewritten on removal, to
/// stay consistent with the rebuilt `VectorIndex`.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn append(&self, chunks: &[(u32, Chunk)]) -> Result<(), ZiriError>;

    async fn get_by_vector_id(&self, vector_id: u32) -> Result<Option<Chunk>, ZiriError>;

    async fn get_by_vector_ids(&self, vector_ids: &[u32]) -> Result<Vec<Option<Chunk>>, ZiriError>;

    /// Fully rewrites the table to match a post-`remove` id remapping.
    async fn rewrite(&self, records: &[(u32, Chunk)]) -> Result<(), ZiriError>;

    async fn find_by_rel_path(&self, rel_path: &str) -> Result<Vec<(u32, Chunk)>, ZiriError>;

    async fn len(&self) -> Result<usize, ZiriError>;

    async fn validate_index(&self, index_count: usize) -> Result<ValidationReport, ZiriError>;
}
