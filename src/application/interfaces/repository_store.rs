use async_trait::async_trait;

use crate::domain::error::ZiriError;
use crate::domain::models::Repository;

/// Persistence for repository metadata (`metadata/index.json`, spec §4.P/§6).
#[async_trait]
pub trait RepositoryMetadataStore: Send + Sync {
    async fn save(&self, repository: &Repository) -> Result<(), ZiriError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Repository>, ZiriError>;

    async fn find_by_path(&self, path: &str) -> Result<Option<Repository>, ZiriError>;

    async fn list(&self) -> Result<Vec<Repository>, ZiriError>;

    async fn delete(&self, id: &str) -> Result<(), ZiriError>;
}
