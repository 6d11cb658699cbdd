use crate::application::interfaces::{ChunkStore, VectorIndex};
use crate::application::streaming::EmbeddedChunk;
use crate::domain::error::ZiriError;
use crate::domain::models::Chunk;

/// Retires every chunk/vector belonging to `paths`: collects their vector
/// ids, removes them from the vector index, and rewrites the chunk store to
/// match the post-removal id remapping. Modified files are re-embedded from
/// scratch rather than patched in place (spec §4.C/§4.L).
pub(crate) async fn retire_paths(
    vector_index: &dyn VectorIndex,
    chunk_store: &dyn ChunkStore,
    paths: &[String],
) -> Result<(), ZiriError> {
    let mut removed_ids = Vec::new();
    for path in paths {
        for (vector_id, _) in chunk_store.find_by_rel_path(path).await? {
            removed_ids.push(vector_id);
        }
    }
    if removed_ids.is_empty() {
        return Ok(());
    }

    let mapping = vector_index.remove(&removed_ids).await?;
    let old_ids: Vec<u32> = mapping.iter().map(|(old, _)| *old).collect();
    let fetched = chunk_store.get_by_vector_ids(&old_ids).await?;
    let rewritten: Vec<(u32, Chunk)> = mapping
        .iter()
        .zip(fetched.into_iter())
        .filter_map(|((_, new_id), chunk)| chunk.map(|c| (*new_id, c)))
        .collect();
    chunk_store.rewrite(&rewritten).await
}

/// Appends freshly embedded chunks to the vector index and chunk store,
/// assigning dense ids starting at the index's current length.
pub(crate) async fn append_embedded(
    vector_index: &dyn VectorIndex,
    chunk_store: &dyn ChunkStore,
    embedded: &[EmbeddedChunk],
) -> Result<(), ZiriError> {
    if embedded.is_empty() {
        return Ok(());
    }
    let mut next_id = vector_index.ntotal().await? as u32;
    let vectors: Vec<Vec<f32>> = embedded.iter().map(|e| e.vector.clone()).collect();
    vector_index.add(&vectors).await?;

    let mut to_append = Vec::with_capacity(embedded.len());
    for item in embedded {
        to_append.push((next_id, item.chunk.clone()));
        next_id += 1;
    }
    chunk_store.append(&to_append).await
}
