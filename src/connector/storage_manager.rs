use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::checkpoint::CheckpointManager;
use crate::application::interfaces::{ChunkStore, FileManifestStore, RepositoryMetadataStore, VectorIndex};
use crate::connector::adapter::{ChunkRecordStore, JsonFileManifestStore, JsonRepositoryMetadataStore, PlainSerializer};
use crate::connector::walker::Walker;
use crate::domain::error::ZiriError;
use crate::domain::models::{compute_file_hash, FileRecord, Repository};
use crate::domain::repo_id::compute_repo_id;

/// Aggregate stats surfaced by the CLI `stats`/`list` commands.
#[derive(Debug, Clone)]
pub struct RepositoryStats {
    pub repository: Repository,
    pub file_count: usize,
}

/// Owns the per-repository on-disk directory layout of spec §4.P/§6:
///
/// ```text
/// <home>/repos/<alias>--<idshort>/
///   db/index.json
///   vectors/embeddings.db(.-vectors.json|-records.json)
///   metadata/index.json
///   checkpoints/<op>/checkpoint-<ts>.json
/// ```
///
/// One `StorageManager` owns a whole `<home>` tree; the per-repository
/// sub-stores it hands out (`VectorIndex`, `ChunkStore`, ...) are
/// exclusively owned by whichever orchestrator run is using them (spec §5:
/// single-writer per repository).
pub struct StorageManager {
    home: PathBuf,
    repos_home: PathBuf,
    manifest_store: Arc<JsonFileManifestStore>,
    metadata_store: Arc<JsonRepositoryMetadataStore>,
}

impl StorageManager {
    pub fn new(home: PathBuf) -> Result<Self, ZiriError> {
        let repos_home = home.join("repos");
        std::fs::create_dir_all(&repos_home)?;
        Ok(Self {
            manifest_store: Arc::new(JsonFileManifestStore::new(repos_home.clone())),
            metadata_store: Arc::new(JsonRepositoryMetadataStore::new(repos_home.clone())),
            repos_home,
            home,
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn metadata_store(&self) -> Arc<dyn RepositoryMetadataStore> {
        self.metadata_store.clone()
    }

    pub fn manifest_store(&self) -> Arc<dyn FileManifestStore> {
        self.manifest_store.clone()
    }

    pub fn checkpoint_manager(&self) -> CheckpointManager {
        CheckpointManager::new(self.home.join("checkpoints"))
    }

    fn repo_dir(&self, repository: &Repository) -> PathBuf {
        self.repos_home.join(repository.store_dir_name())
    }

    /// Returns the existing `Repository` for `path` if one was already
    /// indexed, or creates a fresh unindexed one and its directory tree
    /// (spec §4.A/§4.P: identity is computed, not guessed, from the path).
    pub async fn create_or_open(&self, path: &Path) -> Result<Repository, ZiriError> {
        let canonical = path
            .canonicalize()
            .map_err(|e| ZiriError::input(format!("invalid repository path '{}': {e}", path.display())))?;
        let canonical_str = canonical.to_string_lossy().to_string();

        if let Some(existing) = self.metadata_store.find_by_path(&canonical_str).await? {
            return Ok(existing);
        }

        let (id, alias) = compute_repo_id(&canonical);
        let repository = Repository::new(id, alias, canonical_str, chrono::Utc::now().to_rfc3339());
        let dir = self.repo_dir(&repository);
        for sub in ["db", "vectors", "metadata", "checkpoints"] {
            std::fs::create_dir_all(dir.join(sub))?;
        }
        self.metadata_store.save(&repository).await?;
        Ok(repository)
    }

    pub async fn exists(&self, repository_id: &str) -> Result<bool, ZiriError> {
        Ok(self.metadata_store.find_by_id(repository_id).await?.is_some())
    }

    pub async fn find_by_id(&self, repository_id: &str) -> Result<Option<Repository>, ZiriError> {
        self.metadata_store.find_by_id(repository_id).await
    }

    pub async fn list(&self) -> Result<Vec<Repository>, ZiriError> {
        self.metadata_store.list().await
    }

    pub async fn stats(&self, repository_id: &str) -> Result<Option<RepositoryStats>, ZiriError> {
        let Some(repository) = self.metadata_store.find_by_id(repository_id).await? else {
            return Ok(None);
        };
        let dir_name = repository.store_dir_name();
        let manifest = self.manifest_store.load(&dir_name).await?;
        Ok(Some(RepositoryStats {
            file_count: manifest.len(),
            repository,
        }))
    }

    /// Removes all on-disk state for `repository_id` (spec §4.O `delete_repository`).
    pub async fn delete(&self, repository_id: &str) -> Result<(), ZiriError> {
        self.metadata_store.delete(repository_id).await
    }

    pub async fn save_repository(&self, repository: &Repository) -> Result<(), ZiriError> {
        self.metadata_store.save(repository).await
    }

    pub async fn load_manifest(&self, repository: &Repository) -> Result<HashMap<String, FileRecord>, ZiriError> {
        self.manifest_store.load(&repository.store_dir_name()).await
    }

    pub async fn save_manifest(&self, repository: &Repository, manifest: &HashMap<String, FileRecord>) -> Result<(), ZiriError> {
        self.manifest_store.save(&repository.store_dir_name(), manifest).await
    }

    pub fn open_vector_index(&self, repository: &Repository) -> Result<Arc<dyn VectorIndex>, ZiriError> {
        Ok(Arc::new(crate::connector::adapter::FlatVectorIndex::open(&self.repo_dir(repository))?))
    }

    /// Opens the chunk record store for `repository`, using a plain-JSON
    /// serializer by default. A caller that holds an at-rest encryption key
    /// passes a different `RecordSerializer` directly to `ChunkRecordStore::open`.
    pub fn open_chunk_store(&self, repository: &Repository, provider: &str, model_version: &str) -> Result<Arc<dyn ChunkStore>, ZiriError> {
        Ok(Arc::new(ChunkRecordStore::open(
            &self.repo_dir(repository),
            repository.id(),
            provider,
            model_version,
            Arc::new(PlainSerializer),
        )?))
    }

    pub fn walker(&self, extra_excludes: &[String]) -> Walker {
        Walker::new(extra_excludes)
    }

    /// Hashes repository-relative file content for the manifest (spec §4.C);
    /// a thin pass-through kept here so use cases don't reach into `domain`
    /// directly for a storage-adjacent concern.
    pub fn hash_file(&self, content: &[u8]) -> String {
        compute_file_hash(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_or_open_is_idempotent_for_the_same_path() {
        let home = tempdir().unwrap();
        let repo_path = tempdir().unwrap();
        std::fs::write(repo_path.path().join("a.py"), b"x = 1").unwrap();

        let manager = StorageManager::new(home.path().to_path_buf()).unwrap();
        let first = manager.create_or_open(repo_path.path()).await.unwrap();
        let second = manager.create_or_open(repo_path.path()).await.unwrap();
        assert_eq!(first.id(), second.id());

        let listed = manager.list().await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_repository_directory() {
        let home = tempdir().unwrap();
        let repo_path = tempdir().unwrap();
        let manager = StorageManager::new(home.path().to_path_buf()).unwrap();
        let repository = manager.create_or_open(repo_path.path()).await.unwrap();

        manager.delete(repository.id()).await.unwrap();
        assert!(!manager.exists(repository.id()).await.unwrap());
    }
}
