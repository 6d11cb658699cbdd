use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::application::interfaces::VectorIndex;
use crate::domain::error::ZiriError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVector {
    id: u32,
    vector: Vec<f32>,
}

struct IndexState {
    vectors: Vec<Vec<f32>>,
    dimensions: Option<usize>,
}

/// Exact inner-product index over normalized float32 vectors (spec §4.L).
///
/// Persisted as a pair of files under `vectors/`: `embeddings.db` (a compact
/// binary mirror of the vector count/dimension/data) and
/// `embeddings.db-vectors.json` (the authoritative `[{id, vector}]` form
/// used to rebuild on `remove`). Both are rewritten via write-to-tmp +
/// atomic rename on every mutation, matching the rebuild-on-delete
/// invariant of spec §4.L / §9.
pub struct FlatVectorIndex {
    bin_path: PathBuf,
    json_path: PathBuf,
    state: RwLock<IndexState>,
}

impl FlatVectorIndex {
    /// Loads an existing index from `<repo_dir>/vectors/embeddings.db(-vectors.json)`,
    /// or starts empty if neither file exists yet.
    pub fn open(repo_dir: &Path) -> Result<Self, ZiriError> {
        let vectors_dir = repo_dir.join("vectors");
        std::fs::create_dir_all(&vectors_dir)?;
        let bin_path = vectors_dir.join("embeddings.db");
        let json_path = vectors_dir.join("embeddings.db-vectors.json");

        let (vectors, dimensions) = if json_path.exists() {
            let content = std::fs::read_to_string(&json_path)?;
            let mut stored: Vec<StoredVector> = serde_json::from_str(&content)
                .map_err(|e| ZiriError::corrupt(format!("{}: {e}", json_path.display())))?;
            stored.sort_by_key(|s| s.id);
            let dims = stored.first().map(|s| s.vector.len());
            (stored.into_iter().map(|s| s.vector).collect(), dims)
        } else {
            (Vec::new(), None)
        };

        Ok(Self {
            bin_path,
            json_path,
            state: RwLock::new(IndexState { vectors, dimensions }),
        })
    }

    fn persist(&self, state: &IndexState) -> Result<(), ZiriError> {
        let stored: Vec<StoredVector> = state
            .vectors
            .iter()
            .enumerate()
            .map(|(id, vector)| StoredVector {
                id: id as u32,
                vector: vector.clone(),
            })
            .collect();

        let json = serde_json::to_string(&stored)
            .map_err(|e| ZiriError::internal(format!("serializing vector index: {e}")))?;
        write_atomic(&self.json_path, json.as_bytes())?;
        write_atomic(&self.bin_path, &encode_binary(&state.vectors, state.dimensions))?;
        Ok(())
    }
}

/// `u32 count | u32 dim | count*dim f32`, little-endian. Format is
/// implementation-defined per spec §4.L; the JSON sidecar is authoritative.
fn encode_binary(vectors: &[Vec<f32>], dimensions: Option<usize>) -> Vec<u8> {
    let dim = dimensions.unwrap_or(0);
    let mut buf = Vec::with_capacity(8 + vectors.len() * dim * 4);
    buf.extend_from_slice(&(vectors.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(dim as u32).to_le_bytes());
    for vector in vectors {
        for value in vector {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
    buf
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), ZiriError> {
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn cosine_to_unit(score: f32) -> f32 {
    score.clamp(0.0, 1.0)
}

#[async_trait]
impl VectorIndex for FlatVectorIndex {
    async fn add(&self, vectors: &[Vec<f32>]) -> Result<usize, ZiriError> {
        if vectors.is_empty() {
            return Ok(self.state.read().await.vectors.len());
        }
        let mut state = self.state.write().await;

        let expected = state.dimensions.unwrap_or_else(|| vectors[0].len());
        for vector in vectors {
            if vector.len() != expected {
                return Err(ZiriError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        if state.dimensions.is_none() {
            state.dimensions = Some(expected);
        }

        state.vectors.extend(vectors.iter().cloned());
        self.persist(&state)?;
        Ok(state.vectors.len())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>, ZiriError> {
        let state = self.state.read().await;
        if let Some(dim) = state.dimensions {
            if query.len() != dim {
                return Err(ZiriError::DimensionMismatch {
                    expected: dim,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(u32, f32)> = state
            .vectors
            .iter()
            .enumerate()
            .map(|(id, vector)| {
                let dot: f32 = vector.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
                (id as u32, cosine_to_unit(dot))
            })
            .collect();

        scored.sort_by(|a, b| match b.1.partial_cmp(&a.1) {
            Some(std::cmp::Ordering::Equal) | None => a.0.cmp(&b.0),
            Some(other) => other,
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn remove(&self, ids: &[u32]) -> Result<Vec<(u32, u32)>, ZiriError> {
        let mut state = self.state.write().await;
        let to_remove: std::collections::HashSet<u32> = ids.iter().copied().collect();

        let mut mapping = Vec::new();
        let mut survivors = Vec::with_capacity(state.vectors.len());
        for (old_id, vector) in state.vectors.drain(..).enumerate() {
            let old_id = old_id as u32;
            if to_remove.contains(&old_id) {
                continue;
            }
            let new_id = survivors.len() as u32;
            mapping.push((old_id, new_id));
            survivors.push(vector);
        }

        state.vectors = survivors;
        if state.vectors.is_empty() {
            state.dimensions = None;
        }
        self.persist(&state)?;
        Ok(mapping)
    }

    async fn ntotal(&self) -> Result<usize, ZiriError> {
        Ok(self.state.read().await.vectors.len())
    }

    async fn dimensions(&self) -> Result<Option<usize>, ZiriError> {
        Ok(self.state.read().await.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn unit(v: Vec<f32>) -> Vec<f32> {
        let mag: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.into_iter().map(|x| x / mag).collect()
    }

    #[tokio::test]
    async fn add_and_search_returns_best_match_first() {
        let dir = tempdir().unwrap();
        let index = FlatVectorIndex::open(dir.path()).unwrap();
        index
            .add(&[unit(vec![1.0, 0.0]), unit(vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = index.search(&unit(vec![1.0, 0.1]), 2).await.unwrap();
        assert_eq!(results[0].0, 0);
        assert!(results[0].1 >= results[1].1);
    }

    #[tokio::test]
    async fn dimension_mismatch_on_add_is_rejected() {
        let dir = tempdir().unwrap();
        let index = FlatVectorIndex::open(dir.path()).unwrap();
        index.add(&[unit(vec![1.0, 0.0])]).await.unwrap();
        let err = index.add(&[vec![1.0, 0.0, 0.0]]).await.unwrap_err();
        assert!(matches!(err, ZiriError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn remove_rebuilds_with_dense_ids() {
        let dir = tempdir().unwrap();
        let index = FlatVectorIndex::open(dir.path()).unwrap();
        index
            .add(&[unit(vec![1.0, 0.0]), unit(vec![0.0, 1.0]), unit(vec![1.0, 1.0])])
            .await
            .unwrap();

        let mapping = index.remove(&[0]).await.unwrap();
        assert_eq!(index.ntotal().await.unwrap(), 2);
        assert!(mapping.contains(&(1, 0)));
        assert!(mapping.contains(&(2, 1)));
    }

    #[tokio::test]
    async fn reopen_restores_persisted_vectors() {
        let dir = tempdir().unwrap();
        {
            let index = FlatVectorIndex::open(dir.path()).unwrap();
            index.add(&[unit(vec![1.0, 0.0])]).await.unwrap();
        }
        let reopened = FlatVectorIndex::open(dir.path()).unwrap();
        assert_eq!(reopened.ntotal().await.unwrap(), 1);
        assert_eq!(reopened.dimensions().await.unwrap(), Some(2));
    }
}
