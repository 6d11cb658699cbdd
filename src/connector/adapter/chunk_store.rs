use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::application::interfaces::{ChunkStore, ValidationReport};
use crate::domain::error::ZiriError;
use crate::domain::models::{estimate_tokens, Chunk, ChunkType, Language};

/// One persisted row of `vectors/embeddings.db-records.json` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedRecord {
    #[serde(rename = "vectorId")]
    vector_id: u32,
    id: String,
    content: String,
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(rename = "absPath")]
    abs_path: String,
    #[serde(rename = "startLine")]
    start_line: u32,
    #[serde(rename = "endLine")]
    end_line: u32,
    #[serde(rename = "fileHash")]
    file_hash: String,
    language: String,
    #[serde(rename = "chunkType")]
    chunk_type: String,
    #[serde(rename = "functionName")]
    function_name: Option<String>,
    #[serde(rename = "className")]
    class_name: Option<String>,
    imports: Vec<String>,
    signature: Option<String>,
    #[serde(rename = "contextBefore")]
    context_before: Vec<String>,
    #[serde(rename = "contextAfter")]
    context_after: Vec<String>,
    #[serde(rename = "createdAt")]
    created_at: String,
    provider: String,
    #[serde(rename = "modelVersion")]
    model_version: String,
}

impl PersistedRecord {
    fn from_chunk(vector_id: u32, chunk: &Chunk, provider: &str, model_version: &str) -> Self {
        Self {
            vector_id,
            id: chunk.id().to_string(),
            content: chunk.content().to_string(),
            file_path: chunk.rel_path().to_string(),
            abs_path: chunk.abs_path().to_string(),
            start_line: chunk.start_line(),
            end_line: chunk.end_line(),
            file_hash: chunk.file_hash().to_string(),
            language: chunk.language().as_str().to_string(),
            chunk_type: chunk.chunk_type().as_str().to_string(),
            function_name: chunk.function_name().map(str::to_string),
            class_name: chunk.class_name().map(str::to_string),
            imports: chunk.imports().to_vec(),
            signature: chunk.signature().map(str::to_string),
            context_before: chunk.context_before().to_vec(),
            context_after: chunk.context_after().to_vec(),
            created_at: chrono::Utc::now().to_rfc3339(),
            provider: provider.to_string(),
            model_version: model_version.to_string(),
        }
    }

    fn to_chunk(&self, repository_id: &str) -> Chunk {
        Chunk::reconstitute(
            self.id.clone(),
            repository_id.to_string(),
            self.file_path.clone(),
            self.abs_path.clone(),
            self.content.clone(),
            self.start_line,
            self.end_line,
            estimate_tokens(&self.content),
            Language::parse(&self.language),
            ChunkType::parse(&self.chunk_type),
            self.function_name.clone(),
            self.class_name.clone(),
            self.imports.clone(),
            self.signature.clone(),
            self.context_before.clone(),
            self.context_after.clone(),
            self.file_hash.clone(),
        )
    }
}

/// Pluggable at-rest serialization for the chunk record table (REDESIGN
/// FLAGS: single `RecordFormat` with a plain vs. encrypted `Serializer`,
/// replacing the teacher-original's separate enhanced/legacy code paths).
pub trait RecordSerializer: Send + Sync {
    fn serialize(&self, records: &[u8]) -> Result<Vec<u8>, ZiriError>;
    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<u8>, ZiriError>;
}

pub struct PlainSerializer;

impl RecordSerializer for PlainSerializer {
    fn serialize(&self, records: &[u8]) -> Result<Vec<u8>, ZiriError> {
        Ok(records.to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<u8>, ZiriError> {
        Ok(bytes.to_vec())
    }
}

#[derive(Serialize, Deserialize)]
struct EncryptedEnvelope {
    nonce: String,
    ciphertext: String,
}

/// AES-256-GCM at-rest encryption. The passphrase-to-key derivation and any
/// UX around it are out of scope (spec §1): callers hand this a 32-byte key
/// they already obtained.
pub struct EncryptedSerializer {
    cipher: Aes256Gcm,
}

impl EncryptedSerializer {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }
}

impl RecordSerializer for EncryptedSerializer {
    fn serialize(&self, records: &[u8]) -> Result<Vec<u8>, ZiriError> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, records)
            .map_err(|e| ZiriError::internal(format!("encrypting chunk store: {e}")))?;
        let envelope = EncryptedEnvelope {
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        };
        serde_json::to_vec(&envelope).map_err(|e| ZiriError::internal(format!("{e}")))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<u8>, ZiriError> {
        let envelope: EncryptedEnvelope =
            serde_json::from_slice(bytes).map_err(|e| ZiriError::corrupt(format!("record envelope: {e}")))?;
        let nonce_bytes = BASE64
            .decode(envelope.nonce)
            .map_err(|e| ZiriError::corrupt(format!("record nonce: {e}")))?;
        let ciphertext = BASE64
            .decode(envelope.ciphertext)
            .map_err(|e| ZiriError::corrupt(format!("record ciphertext: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|e| ZiriError::corrupt(format!("decrypting chunk store: {e}")))
    }
}

/// Durable vector-position -> chunk-record table (spec §4.M), backed by
/// `vectors/embeddings.db-records.json`. Writes are append-only during
/// indexing and fully rewritten on removal to track a rebuilt `VectorIndex`.
pub struct ChunkRecordStore {
    path: PathBuf,
    repository_id: String,
    provider: String,
    model_version: String,
    serializer: Arc<dyn RecordSerializer>,
    records: RwLock<Vec<PersistedRecord>>,
}

impl ChunkRecordStore {
    pub fn open(
        repo_dir: &Path,
        repository_id: impl Into<String>,
        provider: impl Into<String>,
        model_version: impl Into<String>,
        serializer: Arc<dyn RecordSerializer>,
    ) -> Result<Self, ZiriError> {
        let vectors_dir = repo_dir.join("vectors");
        std::fs::create_dir_all(&vectors_dir)?;
        let path = vectors_dir.join("embeddings.db-records.json");

        let records = if path.exists() {
            let raw = std::fs::read(&path)?;
            let plain = serializer.deserialize(&raw)?;
            serde_json::from_slice(&plain).map_err(|e| ZiriError::corrupt(format!("{}: {e}", path.display())))?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            repository_id: repository_id.into(),
            provider: provider.into(),
            model_version: model_version.into(),
            serializer,
            records: RwLock::new(records),
        })
    }

    fn persist(&self, records: &[PersistedRecord]) -> Result<(), ZiriError> {
        let plain = serde_json::to_vec(records).map_err(|e| ZiriError::internal(format!("{e}")))?;
        let on_disk = self.serializer.serialize(&plain)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &on_disk)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for ChunkRecordStore {
    async fn append(&self, chunks: &[(u32, Chunk)]) -> Result<(), ZiriError> {
        let mut records = self.records.write().await;
        for (vector_id, chunk) in chunks {
            records.push(PersistedRecord::from_chunk(*vector_id, chunk, &self.provider, &self.model_version));
        }
        self.persist(&records)?;
        Ok(())
    }

    async fn get_by_vector_id(&self, vector_id: u32) -> Result<Option<Chunk>, ZiriError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.vector_id == vector_id)
            .map(|r| r.to_chunk(&self.repository_id)))
    }

    async fn get_by_vector_ids(&self, vector_ids: &[u32]) -> Result<Vec<Option<Chunk>>, ZiriError> {
        let records = self.records.read().await;
        Ok(vector_ids
            .iter()
            .map(|id| records.iter().find(|r| r.vector_id == *id).map(|r| r.to_chunk(&self.repository_id)))
            .collect())
    }

    async fn rewrite(&self, new_records: &[(u32, Chunk)]) -> Result<(), ZiriError> {
        let mut records = self.records.write().await;
        *records = new_records
            .iter()
            .map(|(vector_id, chunk)| PersistedRecord::from_chunk(*vector_id, chunk, &self.provider, &self.model_version))
            .collect();
        self.persist(&records)?;
        Ok(())
    }

    async fn find_by_rel_path(&self, rel_path: &str) -> Result<Vec<(u32, Chunk)>, ZiriError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.file_path == rel_path)
            .map(|r| (r.vector_id, r.to_chunk(&self.repository_id)))
            .collect())
    }

    async fn len(&self) -> Result<usize, ZiriError> {
        Ok(self.records.read().await.len())
    }

    async fn validate_index(&self, index_count: usize) -> Result<ValidationReport, ZiriError> {
        let records = self.records.read().await;
        let mut seen_ids = HashSet::new();
        let mut duplicates = Vec::new();
        for record in records.iter() {
            if !seen_ids.insert(record.id.clone()) {
                duplicates.push(record.id.clone());
            }
        }
        let out_of_range: Vec<u32> = records
            .iter()
            .map(|r| r.vector_id)
            .filter(|id| *id as usize >= index_count)
            .collect();

        Ok(ValidationReport {
            record_count: records.len(),
            index_count,
            duplicate_chunk_ids: duplicates,
            out_of_range_vector_ids: out_of_range,
        })
    }
}
