use serde::{Deserialize, Serialize};

/// A dense float32 vector paired with the chunk it embeds (spec §3, `Vector`).
///
/// Stored L2-normalized so cosine similarity reduces to an inner product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    chunk_id: String,
    vector: Vec<f32>,
    provider: String,
}

impl Embedding {
    pub fn new(chunk_id: impl Into<String>, vector: Vec<f32>, provider: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            vector,
            provider: provider.into(),
        }
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    pub fn magnitude(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    pub fn is_normalized(&self) -> bool {
        (self.magnitude() - 1.0).abs() < 0.01
    }

    /// Returns an L2-normalized copy. A zero vector is returned unchanged.
    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        let vector = if mag > 0.0 {
            self.vector.iter().map(|x| x / mag).collect()
        } else {
            self.vector.clone()
        };
        Self {
            chunk_id: self.chunk_id.clone(),
            vector,
            provider: self.provider.clone(),
        }
    }

    /// Cosine similarity via inner product, valid when both vectors are normalized.
    pub fn cosine_similarity(&self, other: &[f32]) -> f32 {
        if self.vector.len() != other.len() {
            return 0.0;
        }
        let dot: f32 = self.vector.iter().zip(other.iter()).map(|(a, b)| a * b).sum();
        dot.clamp(-1.0, 1.0)
    }
}

/// L2-normalizes a raw vector in place; a zero vector is left unchanged.
pub fn normalize(vector: &mut [f32]) {
    let mag = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag > 0.0 {
        for x in vector.iter_mut() {
            *x /= mag;
        }
    }
}
