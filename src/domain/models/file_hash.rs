use serde::{Deserialize, Serialize};

/// A manifest entry keyed by repo-relative path (spec §3, `FileRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "hash")]
    content_hash: String,
    size: u64,
    mtime: i64,
    chunks: u32,
}

impl FileRecord {
    pub fn new(content_hash: impl Into<String>, size: u64, mtime: i64, chunks: u32) -> Self {
        Self {
            content_hash: content_hash.into(),
            size,
            mtime,
            chunks,
        }
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    pub fn chunks(&self) -> u32 {
        self.chunks
    }
}

/// Computes the SHA-256 hex digest of file content (spec §4.C).
pub fn compute_file_hash(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(content))
}
