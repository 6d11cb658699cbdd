use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::error::ZiriError;
use crate::domain::models::FileRecord;

/// Persistence for the per-repository file manifest (`db/index.json`, spec
/// §4.C/§6): `rel_path → {hash, size, chunks, mtime}`.
#[async_trait]
pub trait FileManifestStore: Send + Sync {
    async fn load(&self, repository_id: &str) -> Result<HashMap<String, FileRecord>, ZiriError>;

    async fn save(&self, repository_id: &str, manifest: &HashMap<String, FileRecord>) -> Result<(), ZiriError>;
}
