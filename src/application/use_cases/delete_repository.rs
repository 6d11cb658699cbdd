use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::connector::storage_manager::StorageManager;
use crate::domain::error::ZiriError;

/// Removes all on-disk state for a repository (spec §4.O).
pub struct DeleteRepositoryUseCase {
    storage: Arc<StorageManager>,
}

impl DeleteRepositoryUseCase {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }

    pub async fn execute(&self, repository_id: &str) -> Result<(), ZiriError> {
        if !self.storage.exists(repository_id).await? {
            return Err(ZiriError::not_found(format!("no repository with id '{repository_id}'")));
        }
        self.storage.delete(repository_id).await?;
        info!(repository_id, "repository deleted");
        Ok(())
    }

    /// Resolves a filesystem path to its repository id before deleting, for
    /// the CLI's `delete <path>` convenience (spec §6).
    pub async fn execute_by_path(&self, path: &Path) -> Result<(), ZiriError> {
        let canonical = path
            .canonicalize()
            .map_err(|e| ZiriError::input(format!("invalid repository path '{}': {e}", path.display())))?;
        let canonical_str = canonical.to_string_lossy().to_string();

        let repository = self
            .storage
            .metadata_store()
            .find_by_path(&canonical_str)
            .await?
            .ok_or_else(|| ZiriError::not_found(format!("no indexed repository at '{}'", path.display())))?;

        self.execute(repository.id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn deletes_an_existing_repository() {
        let home = tempdir().unwrap();
        let repo_path = tempdir().unwrap();
        let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
        let repository = storage.create_or_open(repo_path.path()).await.unwrap();

        let use_case = DeleteRepositoryUseCase::new(storage.clone());
        use_case.execute(repository.id()).await.unwrap();

        assert!(!storage.exists(repository.id()).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_an_unknown_id_is_not_found() {
        let home = tempdir().unwrap();
        let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
        let use_case = DeleteRepositoryUseCase::new(storage);

        let err = use_case.execute("does-not-exist").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn deletes_by_resolving_the_filesystem_path() {
        let home = tempdir().unwrap();
        let repo_path = tempdir().unwrap();
        let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
        let repository = storage.create_or_open(repo_path.path()).await.unwrap();

        let use_case = DeleteRepositoryUseCase::new(storage.clone());
        use_case.execute_by_path(repo_path.path()).await.unwrap();

        assert!(!storage.exists(repository.id()).await.unwrap());
    }
}
