use serde::{Deserialize, Serialize};

/// Metadata for one indexed repository (spec §3, `Repository`).
///
/// The file-hash manifest itself lives in the storage manager's
/// `db/index.json` (see `connector::storage_manager`); this struct holds the
/// summary fields that are persisted to `metadata/index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    #[serde(rename = "repositoryId")]
    id: String,
    alias: String,
    #[serde(rename = "repositoryPath")]
    path: String,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "lastIndexed")]
    last_indexed: Option<String>,
    #[serde(rename = "embeddingProvider")]
    embedding_provider: Option<String>,
    dimensions: Option<usize>,
    #[serde(rename = "totalChunks")]
    total_chunks: u64,
    #[serde(default = "default_metric_type")]
    #[serde(rename = "metricType")]
    metric_type: String,
    #[serde(default = "default_version")]
    version: u32,
}

fn default_metric_type() -> String {
    "cosine".to_string()
}

fn default_version() -> u32 {
    1
}

impl Repository {
    pub fn new(id: impl Into<String>, alias: impl Into<String>, path: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alias: alias.into(),
            path: path.into(),
            created_at: created_at.into(),
            last_indexed: None,
            embedding_provider: None,
            dimensions: None,
            total_chunks: 0,
            metric_type: default_metric_type(),
            version: default_version(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        alias: String,
        path: String,
        created_at: String,
        last_indexed: Option<String>,
        embedding_provider: Option<String>,
        dimensions: Option<usize>,
        total_chunks: u64,
        metric_type: String,
        version: u32,
    ) -> Self {
        Self {
            id,
            alias,
            path,
            created_at,
            last_indexed,
            embedding_provider,
            dimensions,
            total_chunks,
            metric_type,
            version,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn last_indexed(&self) -> Option<&str> {
        self.last_indexed.as_deref()
    }

    pub fn embedding_provider(&self) -> Option<&str> {
        self.embedding_provider.as_deref()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    pub fn metric_type(&self) -> &str {
        &self.metric_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_indexed(&self) -> bool {
        self.total_chunks > 0
    }

    /// Locks the repository to the embedding provider and dimensionality of
    /// its first `add` (spec §4.L: "dimensions are fixed at first add").
    pub fn bind_provider(&mut self, provider: impl Into<String>, dimensions: usize) {
        self.embedding_provider = Some(provider.into());
        self.dimensions = Some(dimensions);
    }

    pub fn record_index_run(&mut self, indexed_at: impl Into<String>, total_chunks: u64) {
        self.last_indexed = Some(indexed_at.into());
        self.total_chunks = total_chunks;
    }

    pub fn store_dir_name(&self) -> String {
        format!("{}--{}", self.alias, &self.id[..6.min(self.id.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_starts_unindexed() {
        let repo = Repository::new("a".repeat(64), "my-repo", "/path/to/repo", "2026-01-01T00:00:00Z");
        assert!(!repo.is_indexed());
        assert_eq!(repo.metric_type(), "cosine");
    }

    #[test]
    fn binding_provider_locks_dimensions() {
        let mut repo = Repository::new("id", "my-repo", "/path", "2026-01-01T00:00:00Z");
        repo.bind_provider("openai", 1536);
        assert_eq!(repo.embedding_provider(), Some("openai"));
        assert_eq!(repo.dimensions(), Some(1536));
    }

    #[test]
    fn store_dir_name_uses_alias_and_short_id() {
        let repo = Repository::new("abcdef1234567890", "my-repo", "/path", "2026-01-01T00:00:00Z");
        assert_eq!(repo.store_dir_name(), "my-repo--abcdef");
    }
}
