use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::application::interfaces::FileManifestStore;
use crate::domain::error::ZiriError;
use crate::domain::models::FileRecord;

#[derive(Serialize, Deserialize)]
struct ManifestEntry {
    hash: String,
    size: u64,
    chunks: u32,
    mtime: i64,
}

/// Persists the per-repository file manifest to `db/index.json` (spec §4.C/§6):
/// `rel_path -> {hash, size, chunks, mtime}`, rewritten atomically on save.
pub struct JsonFileManifestStore {
    cache: RwLock<HashMap<String, HashMap<String, FileRecord>>>,
    repos_home: PathBuf,
}

impl JsonFileManifestStore {
    pub fn new(repos_home: PathBuf) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            repos_home,
        }
    }

    fn manifest_path(&self, repository_id: &str) -> PathBuf {
        self.repos_home.join(repository_id).join("db").join("index.json")
    }
}

#[async_trait]
impl FileManifestStore for JsonFileManifestStore {
    async fn load(&self, repository_id: &str) -> Result<HashMap<String, FileRecord>, ZiriError> {
        if let Some(manifest) = self.cache.read().await.get(repository_id) {
            return Ok(manifest.clone());
        }

        let path = self.manifest_path(repository_id);
        let manifest = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let raw: HashMap<String, ManifestEntry> =
                serde_json::from_str(&content).map_err(|e| ZiriError::corrupt(format!("{}: {e}", path.display())))?;
            raw.into_iter()
                .map(|(rel_path, entry)| (rel_path, FileRecord::new(entry.hash, entry.size, entry.mtime, entry.chunks)))
                .collect()
        } else {
            HashMap::new()
        };

        self.cache.write().await.insert(repository_id.to_string(), manifest.clone());
        Ok(manifest)
    }

    async fn save(&self, repository_id: &str, manifest: &HashMap<String, FileRecord>) -> Result<(), ZiriError> {
        let path = self.manifest_path(repository_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let raw: HashMap<String, ManifestEntry> = manifest
            .iter()
            .map(|(rel_path, record)| {
                (
                    rel_path.clone(),
                    ManifestEntry {
                        hash: record.content_hash().to_string(),
                        size: record.size(),
                        chunks: record.chunks(),
                        mtime: record.mtime(),
                    },
                )
            })
            .collect();

        let json = serde_json::to_string_pretty(&raw).map_err(|e| ZiriError::internal(format!("{e}")))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &path)?;

        self.cache.write().await.insert(repository_id.to_string(), manifest.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = JsonFileManifestStore::new(dir.path().to_path_buf());

        let mut manifest = HashMap::new();
        manifest.insert("math.py".to_string(), FileRecord::new("hash1", 42, 1_700_000_000, 3));
        store.save("repo-1", &manifest).await.unwrap();

        let loaded = store.load("repo-1").await.unwrap();
        assert_eq!(loaded.get("math.py").unwrap().content_hash(), "hash1");
        assert!(Path::new(&dir.path().join("repo-1/db/index.json")).exists());
    }

    #[tokio::test]
    async fn missing_manifest_loads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileManifestStore::new(dir.path().to_path_buf());
        let loaded = store.load("unseen-repo").await.unwrap();
        assert!(loaded.is_empty());
    }
}
