use std::sync::Arc;

use tracing::info;

use crate::application::interfaces::EmbeddingProvider;
use crate::connector::storage_manager::StorageManager;
use crate::domain::error::ZiriError;
use crate::domain::models::{explain_hit, QueryHit, QueryScope, Repository, SearchQuery};

const FUNCTION_NAME_BOOST: f32 = 1.2;
const CLASS_NAME_BOOST: f32 = 1.15;

/// Embed → search → enrich → rank (spec §4.N).
pub struct QueryCodeUseCase {
    storage: Arc<StorageManager>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl QueryCodeUseCase {
    pub fn new(storage: Arc<StorageManager>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { storage, provider }
    }

    pub async fn execute(&self, query: &SearchQuery, scope: &QueryScope) -> Result<Vec<QueryHit>, ZiriError> {
        let repositories = self.resolve_scope(scope).await?;
        if repositories.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.provider.embed(&[query.text().to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| ZiriError::internal("embedding provider returned no vector for the query"))?;

        let mut all_hits = Vec::new();
        for repository in &repositories {
            if let Some(dims) = repository.dimensions() {
                if dims != query_vector.len() {
                    return Err(ZiriError::ProviderMismatch {
                        indexed: dims,
                        queried: query_vector.len(),
                    });
                }
            }
            let hits = self.search_one(repository, &query_vector, query.text(), query.k()).await?;
            all_hits.extend(hits);
        }

        all_hits.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.vector_id().cmp(&b.vector_id()))
        });
        all_hits.truncate(query.k());

        info!(query = query.text(), repos = repositories.len(), hits = all_hits.len(), "query complete");
        Ok(all_hits)
    }

    async fn resolve_scope(&self, scope: &QueryScope) -> Result<Vec<Repository>, ZiriError> {
        match scope {
            QueryScope::CurrentRepo(path) => {
                let canonical = std::path::Path::new(path)
                    .canonicalize()
                    .map_err(|e| ZiriError::input(format!("invalid repository path '{path}': {e}")))?;
                let repository = self
                    .storage
                    .metadata_store()
                    .find_by_path(&canonical.to_string_lossy())
                    .await?
                    .ok_or_else(|| ZiriError::not_found(format!("no indexed repository at '{path}'")))?;
                Ok(vec![repository])
            }
            QueryScope::Named(ids) => {
                let mut repositories = Vec::with_capacity(ids.len());
                for id in ids {
                    let repository = self
                        .storage
                        .find_by_id(id)
                        .await?
                        .ok_or_else(|| ZiriError::not_found(format!("no repository with id '{id}'")))?;
                    repositories.push(repository);
                }
                Ok(repositories)
            }
            QueryScope::All => self.storage.list().await,
        }
    }

    async fn search_one(&self, repository: &Repository, query_vector: &[f32], query_text: &str, k: usize) -> Result<Vec<QueryHit>, ZiriError> {
        if !repository.is_indexed() {
            return Ok(Vec::new());
        }
        let vector_index = self.storage.open_vector_index(repository)?;
        let chunk_store = self.storage.open_chunk_store(
            repository,
            repository.embedding_provider().unwrap_or(self.provider.provider_tag()),
            "v1",
        )?;

        let found = vector_index.search(query_vector, k).await?;
        let vector_ids: Vec<u32> = found.iter().map(|(id, _)| *id).collect();
        let chunks = chunk_store.get_by_vector_ids(&vector_ids).await?;

        let query_lower = query_text.to_lowercase();
        let mut hits = Vec::with_capacity(found.len());
        for ((vector_id, raw_score), chunk) in found.into_iter().zip(chunks.into_iter()) {
            let Some(chunk) = chunk else {
                hits.push(QueryHit::Legacy {
                    repository_id: repository.id().to_string(),
                    file_path: String::new(),
                    score: raw_score,
                });
                continue;
            };

            let score = apply_boost(raw_score, &query_lower, chunk.function_name(), chunk.class_name());
            let explanation = explain_hit(score, chunk.function_name(), chunk.class_name(), chunk.chunk_type());

            hits.push(QueryHit::Full {
                repository_id: repository.id().to_string(),
                file_path: chunk.rel_path().to_string(),
                start_line: chunk.start_line(),
                end_line: chunk.end_line(),
                score,
                content: chunk.content().to_string(),
                language: chunk.language(),
                chunk_type: chunk.chunk_type(),
                function_name: chunk.function_name().map(str::to_string),
                class_name: chunk.class_name().map(str::to_string),
                imports: chunk.imports().to_vec(),
                signature: chunk.signature().map(str::to_string),
                context_before: chunk.context_before().to_vec(),
                context_after: chunk.context_after().to_vec(),
                explanation,
                vector_id,
            });
        }
        Ok(hits)
    }
}

/// Multiplicative function/class-name boost, clipped to `[0, 1]` (spec §4.N).
fn apply_boost(score: f32, query_lower: &str, function_name: Option<&str>, class_name: Option<&str>) -> f32 {
    let mut boosted = score;
    if let Some(name) = function_name {
        if !name.is_empty() && query_lower.contains(&name.to_lowercase()) {
            boosted *= FUNCTION_NAME_BOOST;
        }
    }
    if let Some(name) = class_name {
        if !name.is_empty() && query_lower.contains(&name.to_lowercase()) {
            boosted *= CLASS_NAME_BOOST;
        }
    }
    boosted.min(1.0)
}
