use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::application::interfaces::{EmbeddingProvider, ProviderLimits};
use crate::domain::error::ZiriError;
use crate::domain::models::normalize;

/// Deterministic stand-in for a real provider (spec §4.F): seeds an RNG from
/// a hash of the input text, so the same text always yields the same
/// normalized vector. Used by tests and as the CLI default when no network
/// provider is configured.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dimensions(384)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.dimensions).map(|_| rng.gen_range(-1.0..1.0)).collect();
        normalize(&mut vector);
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError> {
        let vectors: Vec<Vec<f32>> = texts.iter().map(|text| self.embed_one(text)).collect();
        debug!(count = vectors.len(), "mock provider generated embeddings");
        Ok(vectors)
    }

    fn provider_tag(&self) -> &str {
        "mock"
    }

    fn limits(&self) -> ProviderLimits {
        ProviderLimits {
            max_tokens_per_request: 8_000,
            recommended_batch_size: 64,
            max_concurrency: 8,
            dimensions: self.dimensions,
            supported_models: vec!["mock-embedding".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed(&["hello world".to_string()]).await.unwrap();
        let b = provider.embed(&["hello world".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_normalized() {
        let provider = MockEmbeddingProvider::with_dimensions(16);
        let vectors = provider.embed(&["x".to_string()]).await.unwrap();
        let magnitude: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn distinct_texts_usually_differ() {
        let provider = MockEmbeddingProvider::new();
        let vectors = provider.embed(&["alpha".to_string(), "beta".to_string()]).await.unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }
}
