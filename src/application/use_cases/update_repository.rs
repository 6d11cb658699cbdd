use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::application::interfaces::EmbeddingProvider;
use crate::application::memory::MemoryMonitor;
use crate::application::orchestrator::{Orchestrator, OrchestratorState};
use crate::application::streaming::{FileToProcess, StreamingProcessor};
use crate::application::use_cases::support::retire_paths;
use crate::connector::storage_manager::StorageManager;
use crate::domain::config::OrchestratorConfig;
use crate::domain::error::ZiriError;
use crate::domain::models::{FileRecord, Language};

/// Outcome of one `UpdateRepositoryUseCase::execute` run (spec §4.O).
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub repository_id: String,
    pub changed: usize,
    pub deleted: usize,
}

/// Targeted re-index of an explicit set of changed/deleted paths (spec
/// §4.O `update`), distinct from `IndexRepositoryUseCase`'s full tree walk —
/// intended for watcher-driven incremental runs that already know what moved.
pub struct UpdateRepositoryUseCase {
    storage: Arc<StorageManager>,
    provider: Arc<dyn EmbeddingProvider>,
    orchestrator: Arc<Orchestrator>,
}

impl UpdateRepositoryUseCase {
    pub fn new(storage: Arc<StorageManager>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            storage,
            provider,
            orchestrator: Arc::new(Orchestrator::new()),
        }
    }

    pub fn pause(&self) {
        self.orchestrator.pause();
    }

    pub fn resume(&self) {
        self.orchestrator.resume();
    }

    pub fn cancel(&self) {
        self.orchestrator.cancel();
    }

    pub fn state(&self) -> OrchestratorState {
        self.orchestrator.state()
    }

    pub async fn execute(
        &self,
        repo_path: &Path,
        changed_paths: &[String],
        deleted_paths: &[String],
        config: &OrchestratorConfig,
    ) -> Result<UpdateReport, ZiriError> {
        self.orchestrator.begin();
        let canonical = repo_path
            .canonicalize()
            .map_err(|e| ZiriError::input(format!("invalid repository path '{}': {e}", repo_path.display())))?;
        let repository = self
            .storage
            .metadata_store()
            .find_by_path(&canonical.to_string_lossy())
            .await?
            .ok_or_else(|| ZiriError::not_found(format!("no indexed repository at '{}'", repo_path.display())))?;

        if let Some(bound_provider) = repository.embedding_provider() {
            let queried_dims = self.provider.limits().dimensions;
            let mismatched_tag = bound_provider != self.provider.provider_tag();
            let mismatched_dims = repository.dimensions().is_some_and(|d| d != queried_dims);
            if mismatched_tag || mismatched_dims {
                return Err(ZiriError::ProviderMismatch {
                    indexed: repository.dimensions().unwrap_or(0),
                    queried: queried_dims,
                });
            }
        }

        let mut manifest = self.storage.load_manifest(&repository).await?;
        let vector_index = self.storage.open_vector_index(&repository)?;
        let chunk_store = self.storage.open_chunk_store(&repository, self.provider.provider_tag(), "v1")?;

        let mut retiring: Vec<String> = changed_paths.to_vec();
        retiring.extend(deleted_paths.iter().cloned());
        retire_paths(vector_index.as_ref(), chunk_store.as_ref(), &retiring).await?;

        for path in deleted_paths {
            manifest.remove(path);
        }

        let files_to_embed: Vec<FileToProcess> = changed_paths
            .iter()
            .filter_map(|rel_path| {
                let abs_path = canonical.join(rel_path);
                let bytes = std::fs::read(&abs_path).ok()?;
                let content = String::from_utf8(bytes.clone()).ok()?;
                Some(FileToProcess {
                    rel_path: rel_path.clone(),
                    abs_path: abs_path.to_string_lossy().to_string(),
                    content_hash: self.storage.hash_file(&bytes),
                    content,
                })
            })
            .collect();

        let memory = Arc::new(MemoryMonitor::new(config.memory_limit_mb));
        let checkpoints = Arc::new(self.storage.checkpoint_manager());
        let processor = StreamingProcessor::new(
            self.provider.clone(),
            memory,
            checkpoints,
            self.orchestrator.clone(),
            vector_index.clone(),
            chunk_store.clone(),
            config.batch_size,
        );

        info!(repo = repository.id(), changed = files_to_embed.len(), deleted = deleted_paths.len(), "starting update run");
        self.orchestrator.run();
        let outcome = match processor
            .process(repository.id(), "update", |path| Language::from_path(Path::new(path)), files_to_embed.clone())
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.orchestrator.fail();
                return Err(err);
            }
        };

        // Each file's vectors/records were already persisted inside
        // `process()` as it ran, ahead of that file's checkpoint save.
        let chunks_per_file = crate::application::streaming::count_chunks_per_file(&outcome.embedded);
        for file in &files_to_embed {
            let Ok(metadata) = std::fs::metadata(&file.abs_path) else {
                continue;
            };
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            let chunks = chunks_per_file.get(&file.rel_path).copied().unwrap_or(0);
            manifest.insert(
                file.rel_path.clone(),
                FileRecord::new(file.content_hash.clone(), metadata.len(), mtime, chunks),
            );
        }
        self.storage.save_manifest(&repository, &manifest).await?;

        let total_chunks = chunk_store.len().await? as u64;
        let mut updated = repository;
        updated.record_index_run(chrono::Utc::now().to_rfc3339(), total_chunks);
        self.storage.save_repository(&updated).await?;

        self.orchestrator.complete();
        Ok(UpdateReport {
            repository_id: updated.id().to_string(),
            changed: changed_paths.len(),
            deleted: deleted_paths.len(),
        })
    }
}
