use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::interfaces::RepositoryMetadataStore;
use crate::domain::error::ZiriError;
use crate::domain::models::Repository;

/// Persists repository metadata to `metadata/index.json` (spec §4.P/§6).
/// `find_by_path`/`list` scan the repos-home directory tree since there is
/// no separate global index — the per-repo directory layout is the index.
pub struct JsonRepositoryMetadataStore {
    repos_home: PathBuf,
    lock: RwLock<()>,
}

impl JsonRepositoryMetadataStore {
    pub fn new(repos_home: PathBuf) -> Self {
        Self {
            repos_home,
            lock: RwLock::new(()),
        }
    }

    fn metadata_path(&self, store_dir_name: &str) -> PathBuf {
        self.repos_home.join(store_dir_name).join("metadata").join("index.json")
    }

    fn read_repository(path: &std::path::Path) -> Result<Option<Repository>, ZiriError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let repository: Repository =
            serde_json::from_str(&content).map_err(|e| ZiriError::corrupt(format!("{}: {e}", path.display())))?;
        Ok(Some(repository))
    }

    fn store_dir_for(&self, repository: &Repository) -> String {
        repository.store_dir_name()
    }
}

#[async_trait]
impl RepositoryMetadataStore for JsonRepositoryMetadataStore {
    async fn save(&self, repository: &Repository) -> Result<(), ZiriError> {
        let _guard = self.lock.write().await;
        let dir_name = self.store_dir_for(repository);
        let path = self.metadata_path(&dir_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(repository).map_err(|e| ZiriError::internal(format!("{e}")))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Repository>, ZiriError> {
        let _guard = self.lock.read().await;
        if !self.repos_home.exists() {
            return Ok(None);
        }
        for entry in std::fs::read_dir(&self.repos_home)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path().join("metadata").join("index.json");
            if let Some(repository) = Self::read_repository(&path)? {
                if repository.id() == id {
                    return Ok(Some(repository));
                }
            }
        }
        Ok(None)
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<Repository>, ZiriError> {
        let _guard = self.lock.read().await;
        if !self.repos_home.exists() {
            return Ok(None);
        }
        for entry in std::fs::read_dir(&self.repos_home)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let metadata_path = entry.path().join("metadata").join("index.json");
            if let Some(repository) = Self::read_repository(&metadata_path)? {
                if repository.path() == path {
                    return Ok(Some(repository));
                }
            }
        }
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<Repository>, ZiriError> {
        let _guard = self.lock.read().await;
        if !self.repos_home.exists() {
            return Ok(Vec::new());
        }
        let mut repositories = Vec::new();
        for entry in std::fs::read_dir(&self.repos_home)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path().join("metadata").join("index.json");
            if let Some(repository) = Self::read_repository(&path)? {
                repositories.push(repository);
            }
        }
        Ok(repositories)
    }

    async fn delete(&self, id: &str) -> Result<(), ZiriError> {
        let _guard = self.lock.write().await;
        if let Some(repository) = self.find_by_id(id).await? {
            let dir = self.repos_home.join(self.store_dir_for(&repository));
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Repository {
        Repository::new("abcdef1234567890", "my-repo", "/path/to/repo", "2026-01-01T00:00:00Z")
    }

    #[tokio::test]
    async fn save_then_find_by_id_and_path() {
        let dir = tempdir().unwrap();
        let store = JsonRepositoryMetadataStore::new(dir.path().to_path_buf());
        let repo = sample();
        store.save(&repo).await.unwrap();

        let by_id = store.find_by_id(repo.id()).await.unwrap().unwrap();
        assert_eq!(by_id.alias(), "my-repo");

        let by_path = store.find_by_path("/path/to/repo").await.unwrap().unwrap();
        assert_eq!(by_path.id(), repo.id());
    }

    #[tokio::test]
    async fn delete_removes_the_whole_repo_directory() {
        let dir = tempdir().unwrap();
        let store = JsonRepositoryMetadataStore::new(dir.path().to_path_buf());
        let repo = sample();
        store.save(&repo).await.unwrap();

        store.delete(repo.id()).await.unwrap();
        assert!(store.find_by_id(repo.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_returns_all_saved_repositories() {
        let dir = tempdir().unwrap();
        let store = JsonRepositoryMetadataStore::new(dir.path().to_path_buf());
        store.save(&sample()).await.unwrap();
        let repos = store.list().await.unwrap();
        assert_eq!(repos.len(), 1);
    }
}
