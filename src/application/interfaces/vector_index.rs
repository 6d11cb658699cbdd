use async_trait::async_trait;

use crate::domain::error::ZiriError;

/// Exact inner-product index over normalized float32 vectors (spec §4.L).
///
/// Dimensions are fixed at the first `add` call; a later `add` with a
/// different dimension fails with `ZiriError::DimensionMismatch`.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Appends vectors, returning the new total count.
    async fn add(&self, vectors: &[Vec<f32>]) -> Result<usize, ZiriError>;

    /// Returns up to `k` `(vector_id, score)` pairs, scores clipped to `[0,1]`,
    /// sorted by `(score desc, vector_id asc)`.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>, ZiriError>;

    /// Rebuilds the index without the given vector ids, reassigning dense
    /// ids `0..N-1` for the survivors. Returns the old→new id mapping.
    async fn remove(&self, ids: &[u32]) -> Result<Vec<(u32, u32)>, ZiriError>;

    async fn ntotal(&self) -> Result<usize, ZiriError>;

    async fn dimensions(&self) -> Result<Option<usize>, ZiriError>;
}
