use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::application::interfaces::EmbeddingProvider;
use crate::application::memory::MemoryMonitor;
use crate::application::orchestrator::{Orchestrator, OrchestratorState};
use crate::application::streaming::{count_chunks_per_file, FileToProcess, StreamingProcessor};
use crate::application::use_cases::support::retire_paths;
use crate::connector::storage_manager::StorageManager;
use crate::domain::change_detector::{classify_changes, FileChange};
use crate::domain::config::OrchestratorConfig;
use crate::domain::error::ZiriError;
use crate::domain::models::{FileRecord, Language};

/// Outcome of one `IndexRepositoryUseCase::execute` run (spec §4.O).
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub repository_id: String,
    pub files_processed: usize,
    pub files_deleted: usize,
    pub chunks_generated: usize,
    pub duration_ms: u64,
}

/// Full and incremental indexing orchestration (spec §4.O): walks the
/// repository, diffs it against the previous manifest, retires stale
/// chunks/vectors, and streams the rest through chunking + embedding.
pub struct IndexRepositoryUseCase {
    storage: Arc<StorageManager>,
    provider: Arc<dyn EmbeddingProvider>,
    orchestrator: Arc<Orchestrator>,
}

impl IndexRepositoryUseCase {
    pub fn new(storage: Arc<StorageManager>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            storage,
            provider,
            orchestrator: Arc::new(Orchestrator::new()),
        }
    }

    /// Pauses the in-flight run at the next cooperative checkpoint (spec §4.O).
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

    pub async fn execute(&self, repo_path: &Path, config: &OrchestratorConfig) -> Result<IndexReport, ZiriError> {
        let started = Instant::now();
        self.orchestrator.begin();
        let repository = self.storage.create_or_open(repo_path).await?;

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

        let mut manifest = if config.force_full {
            HashMap::new()
        } else {
            self.storage.load_manifest(&repository).await?
        };

        let walker = self.storage.walker(&config.exclude);
        let walked = walker.walk(repo_path)?;
        let changes = classify_changes(&walked, &manifest);
        let change_by_path: HashMap<&str, &FileChange> =
            changes.iter().map(|(path, change)| (path.as_str(), change)).collect();

        let vector_index = self.storage.open_vector_index(&repository)?;
        let chunk_store = self.storage.open_chunk_store(&repository, self.provider.provider_tag(), "v1")?;

        let retiring: Vec<String> = changes
            .iter()
            .filter(|(_, change)| matches!(change, FileChange::Modified | FileChange::Deleted))
            .map(|(path, _)| path.clone())
            .collect();
        retire_paths(vector_index.as_ref(), chunk_store.as_ref(), &retiring).await?;
        for path in &retiring {
            manifest.remove(path);
        }

        let files_deleted = changes.iter().filter(|(_, c)| *c == FileChange::Deleted).count();

        let files_to_embed: Vec<FileToProcess> = walked
            .iter()
            .filter(|file| matches!(change_by_path.get(file.rel_path.as_str()), Some(FileChange::Added) | Some(FileChange::Modified)))
            .filter_map(|file| {
                std::fs::read_to_string(&file.abs_path).ok().map(|content| FileToProcess {
                    rel_path: file.rel_path.clone(),
                    abs_path: file.abs_path.clone(),
                    content_hash: file.content_hash.clone(),
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

        let progress = ProgressBar::new(files_to_embed.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {bar:40.green/dim} {pos}/{len} {msg:.dim}")
                .expect("invalid progress bar template")
                .progress_chars("━━─"),
        );
        info!(repo = repository.id(), files = files_to_embed.len(), "starting indexing run");

        self.orchestrator.run();
        let outcome = match processor
            .process(repository.id(), "index", |path| Language::from_path(Path::new(path)), files_to_embed)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                progress.finish_and_clear();
                self.orchestrator.fail();
                return Err(err);
            }
        };
        progress.finish_and_clear();

        // Each file's vectors/records were already persisted inside
        // `process()` as it ran, ahead of that file's checkpoint save.
        let chunks_per_file = count_chunks_per_file(&outcome.embedded);
        for file in &walked {
            if matches!(change_by_path.get(file.rel_path.as_str()), Some(FileChange::Unchanged) | None) {
                continue;
            }
            let chunks = chunks_per_file.get(&file.rel_path).copied().unwrap_or(0);
            manifest.insert(
                file.rel_path.clone(),
                FileRecord::new(file.content_hash.clone(), file.size, file.mtime, chunks),
            );
        }
        self.storage.save_manifest(&repository, &manifest).await?;

        let mut updated = self.storage.find_by_id(repository.id()).await?.unwrap_or(repository);
        if let Some(dims) = vector_index.dimensions().await? {
            if updated.embedding_provider().is_none() {
                updated.bind_provider(self.provider.provider_tag(), dims);
            }
        }
        let total_chunks = chunk_store.len().await? as u64;
        updated.record_index_run(chrono::Utc::now().to_rfc3339(), total_chunks);
        self.storage.save_repository(&updated).await?;

        let report = IndexReport {
            repository_id: updated.id().to_string(),
            files_processed: outcome.processed_files.len(),
            files_deleted,
            chunks_generated: outcome.embedded.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            repo = report.repository_id,
            files = report.files_processed,
            deleted = report.files_deleted,
            chunks = report.chunks_generated,
            duration_ms = report.duration_ms,
            "indexing complete"
        );
        self.orchestrator.complete();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::adapter::MockEmbeddingProvider;
    use tempfile::tempdir;

    fn config(home: &Path) -> OrchestratorConfig {
        OrchestratorConfig {
            home: home.to_path_buf(),
            default_provider: "mock".to_string(),
            concurrency: 2,
            batch_size: 4,
            memory_limit_mb: 100_000,
            exclude: Vec::new(),
            force_full: false,
        }
    }

    #[tokio::test]
    async fn indexes_a_fresh_repository() {
        let home = tempdir().unwrap();
        let repo = tempdir().unwrap();
        std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

        let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
        let provider = Arc::new(MockEmbeddingProvider::with_dimensions(8));
        let use_case = IndexRepositoryUseCase::new(storage.clone(), provider);

        let report = use_case.execute(repo.path(), &config(home.path())).await.unwrap();
        assert_eq!(report.files_processed, 1);
        assert!(report.chunks_generated >= 1);

        let repository = storage.find_by_id(&report.repository_id).await.unwrap().unwrap();
        assert!(repository.is_indexed());
        assert_eq!(repository.embedding_provider(), Some("mock"));
    }

    #[tokio::test]
    async fn reindexing_unchanged_tree_embeds_nothing_new() {
        let home = tempdir().unwrap();
        let repo = tempdir().unwrap();
        std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

        let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
        let provider = Arc::new(MockEmbeddingProvider::with_dimensions(8));
        let use_case = IndexRepositoryUseCase::new(storage, provider);
        let cfg = config(home.path());

        use_case.execute(repo.path(), &cfg).await.unwrap();
        let second = use_case.execute(repo.path(), &cfg).await.unwrap();
        assert_eq!(second.chunks_generated, 0);
        assert_eq!(second.files_processed, 0);
    }

    #[tokio::test]
    async fn reindexing_after_provider_switch_is_rejected() {
        let home = tempdir().unwrap();
        let repo = tempdir().unwrap();
        std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

        let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
        let cfg = config(home.path());
        IndexRepositoryUseCase::new(storage.clone(), Arc::new(MockEmbeddingProvider::with_dimensions(8)))
            .execute(repo.path(), &cfg)
            .await
            .unwrap();

        let other_provider = Arc::new(MockEmbeddingProvider::with_dimensions(16));
        let err = IndexRepositoryUseCase::new(storage, other_provider)
            .execute(repo.path(), &cfg)
            .await
            .unwrap_err();
        assert!(matches!(err, ZiriError::ProviderMismatch { .. }));
    }
}
