use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::batching::AdaptiveBatcher;
use crate::application::checkpoint::{Checkpoint, CheckpointManager, ProcessedFileEntry};
use crate::application::concurrency::ConcurrencyGate;
use crate::application::interfaces::{ChunkStore, EmbeddingProvider, VectorIndex};
use crate::application::memory::MemoryMonitor;
use crate::application::orchestrator::Orchestrator;
use crate::application::use_cases::support::append_embedded;
use crate::domain::chunker::{chunk_lines, ChunkerConfig};
use crate::domain::error::{ProviderErrorKind, ZiriError};
use crate::domain::metadata::{extract_metadata, surrounding_context};
use crate::domain::models::{Chunk, Language};

const CONTEXT_LINES: usize = 2;

/// A file queued for chunking + embedding.
#[derive(Debug, Clone)]
pub struct FileToProcess {
    pub rel_path: String,
    pub abs_path: String,
    pub content_hash: String,
    pub content: String,
}

/// A chunk paired with its embedding, ready for persistence.
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Result of one `StreamingProcessor::process` run.
pub struct StreamingOutcome {
    pub embedded: Vec<EmbeddedChunk>,
    pub processed_files: Vec<ProcessedFileEntry>,
    pub skipped_chunks: usize,
}

/// Composes chunking/metadata extraction with adaptive batching and bounded
/// concurrency under memory and checkpoint control (spec §4.K).
pub struct StreamingProcessor {
    provider: Arc<dyn EmbeddingProvider>,
    batcher: AdaptiveBatcher,
    gate: ConcurrencyGate,
    memory: Arc<MemoryMonitor>,
    checkpoints: Arc<CheckpointManager>,
    orchestrator: Arc<Orchestrator>,
    vector_index: Arc<dyn VectorIndex>,
    chunk_store: Arc<dyn ChunkStore>,
    chunker_config: ChunkerConfig,
}

impl StreamingProcessor {
    /// `orchestrator` supplies the cancellation token shared with the
    /// concurrency gate and the cooperative pause point consulted between
    /// files (spec §4.K/§4.O: `pause()`/`resume()` control this processor).
    /// `vector_index`/`chunk_store` are where each file's embedded chunks are
    /// durably persisted *before* the checkpoint advances past that file
    /// (spec §4.K step 6, §5: checkpoint writes happen-before the emission
    /// that advances the processed-count past a file).
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        memory: Arc<MemoryMonitor>,
        checkpoints: Arc<CheckpointManager>,
        orchestrator: Arc<Orchestrator>,
        vector_index: Arc<dyn VectorIndex>,
        chunk_store: Arc<dyn ChunkStore>,
        configured_batch_size: usize,
    ) -> Self {
        let limits = provider.limits();
        let initial = configured_batch_size.min(limits.recommended_batch_size).max(1);
        let batcher = AdaptiveBatcher::new(
            (limits.recommended_batch_size / 4).max(1),
            limits.recommended_batch_size.max(initial),
            initial,
            limits.max_tokens_per_request,
        );
        let gate = ConcurrencyGate::new(limits.max_concurrency, orchestrator.cancellation_token());
        Self {
            provider,
            batcher,
            gate,
            memory,
            checkpoints,
            orchestrator,
            vector_index,
            chunk_store,
            chunker_config: ChunkerConfig::default(),
        }
    }

    /// Runs the pipeline of spec §4.K steps 1–7 over `files` for `(repo_id, op_type)`.
    pub async fn process(
        &self,
        repo_id: &str,
        op_type: &str,
        language_of: impl Fn(&str) -> Language,
        files: Vec<FileToProcess>,
    ) -> Result<StreamingOutcome, ZiriError> {
        let mut checkpoint = self.checkpoints.init_or_resume(repo_id, op_type)?;
        let mut embedded = Vec::new();
        let mut skipped_chunks = 0usize;
        let mut files_since_save = 0usize;

        for file in files {
            if checkpoint.is_processed(&file.rel_path) {
                continue;
            }

            self.orchestrator.wait_if_paused().await.map_err(|err| {
                self.checkpoints.save(&checkpoint).ok();
                err
            })?;
            if self.gate.is_cancelled() {
                self.checkpoints.save(&checkpoint)?;
                return Err(ZiriError::Cancelled);
            }
            checkpoint.current_file = Some(file.rel_path.clone());

            let language = language_of(&file.rel_path);
            let chunks = self.build_chunks(repo_id, &file, language);

            let (file_embedded, file_skipped) = self.embed_chunks(chunks).await?;
            skipped_chunks += file_skipped;

            // Persist before the checkpoint advances past this file, so a
            // kill-and-resume never silently drops an already-checkpointed
            // file's vectors (spec §4.K step 6, §5, §8 property 9).
            append_embedded(self.vector_index.as_ref(), self.chunk_store.as_ref(), &file_embedded).await?;
            let file_chunk_count = file_embedded.len() as u32;
            embedded.extend(file_embedded);

            checkpoint.mark_processed(ProcessedFileEntry {
                path: file.rel_path.clone(),
                hash: file.content_hash.clone(),
                chunks: file_chunk_count,
                processed_at: chrono::Utc::now().to_rfc3339(),
            });
            files_since_save += 1;
            if files_since_save >= self.checkpoints.save_every_n() {
                self.checkpoints.save(&checkpoint)?;
                files_since_save = 0;
            }
        }

        checkpoint.current_file = None;
        checkpoint.mark_completed();
        self.checkpoints.save(&checkpoint)?;

        Ok(StreamingOutcome {
            embedded,
            processed_files: checkpoint.processed_files,
            skipped_chunks,
        })
    }

    fn build_chunks(&self, repo_id: &str, file: &FileToProcess, language: Language) -> Vec<Chunk> {
        let raw_chunks = chunk_lines(&file.content, &self.chunker_config);
        let file_lines: Vec<&str> = file.content.lines().collect();

        raw_chunks
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let metadata = extract_metadata(&raw.content, language);
                let (before, after) =
                    surrounding_context(&file_lines, raw.start_line, raw.end_line, CONTEXT_LINES);

                let mut chunk = Chunk::new(
                    repo_id,
                    &file.rel_path,
                    &file.abs_path,
                    raw.content,
                    raw.start_line,
                    raw.end_line,
                    index,
                    &file.content_hash,
                    language,
                )
                .with_context(before, after);

                if let Some(chunk_type) = metadata.chunk_type {
                    chunk = chunk.with_chunk_type(chunk_type);
                }
                if let Some(name) = metadata.function_name {
                    chunk = chunk.with_function_name(name);
                }
                if let Some(name) = metadata.class_name {
                    chunk = chunk.with_class_name(name);
                }
                if !metadata.imports.is_empty() {
                    chunk = chunk.with_imports(metadata.imports);
                }
                if let Some(signature) = metadata.signature {
                    chunk = chunk.with_signature(signature);
                }
                chunk
            })
            .collect()
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<(Vec<EmbeddedChunk>, usize), ZiriError> {
        if chunks.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let pack_result = self.batcher.pack(chunks);
        let skipped = pack_result.skipped.len();

        let mut tasks: Vec<Box<dyn FnOnce(CancellationToken) -> futures_util::future::BoxFuture<'static, Result<(Vec<Chunk>, Vec<Vec<f32>>), ZiriError>> + Send>> = Vec::new();
        for batch in pack_result.batches {
            let provider = self.provider.clone();
            tasks.push(Box::new(move |_cancellation| {
                Box::pin(async move {
                    let texts: Vec<String> = batch.iter().map(|c| c.content().to_string()).collect();
                    let vectors = embed_with_retry(provider.as_ref(), &texts).await?;
                    Ok((batch, vectors))
                })
            }));
        }

        self.memory.wait_for_available(Duration::from_secs(300)).await?;

        let results = self.gate.run_all(tasks).await;

        let mut embedded = Vec::new();
        for result in results {
            match result {
                Ok((batch, vectors)) => {
                    for (chunk, vector) in batch.into_iter().zip(vectors.into_iter()) {
                        embedded.push(EmbeddedChunk { chunk, vector });
                    }
                }
                Err(err) => {
                    warn!(error = %err, "batch failed, chunks will be retried on next run");
                }
            }
        }

        Ok((embedded, skipped))
    }
}

/// Retries a batch per the provider's retry policy (spec §4.F): `RateLimit`
/// uses the dedicated delay; `Auth`/`ClientInput` fail immediately;
/// `Network`/`Timeout`/`Server` retry with exponential backoff + jitter.
async fn embed_with_retry(provider: &dyn EmbeddingProvider, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError> {
    let policy = provider.retry_policy();
    let mut attempt = 0u32;
    let mut delay_ms = policy.base_delay_ms;

    loop {
        let started = Instant::now();
        match provider.embed(texts).await {
            Ok(vectors) => {
                info!(elapsed_ms = started.elapsed().as_millis() as u64, batch_size = texts.len(), "batch embedded");
                return Ok(vectors);
            }
            Err(ZiriError::Provider { kind, message }) => {
                if !kind.is_retryable() || attempt >= policy.max_retries {
                    return Err(ZiriError::provider(kind, message));
                }
                let wait_ms = if matches!(kind, ProviderErrorKind::RateLimit) {
                    policy.rate_limit_delay_ms.unwrap_or(delay_ms)
                } else {
                    jittered(delay_ms, policy.jitter)
                };
                warn!(attempt, wait_ms, kind = %kind, "embedding batch failed, retrying");
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                attempt += 1;
                delay_ms = ((delay_ms as f64) * policy.multiplier).min(policy.max_delay_ms as f64) as u64;
            }
            Err(other) => return Err(other),
        }
    }
}

fn jittered(delay_ms: u64, jitter: bool) -> u64 {
    if !jitter {
        return delay_ms;
    }
    let mut rng = rand::thread_rng();
    let factor = rng.gen_range(0.75..=1.25);
    (delay_ms as f64 * factor) as u64
}

/// Builds the `HashMap<rel_path -> FileRecord-ready data>` helper consumers
/// need when turning a `StreamingOutcome` into a manifest update.
pub fn count_chunks_per_file(embedded: &[EmbeddedChunk]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for item in embedded {
        *counts.entry(item.chunk.rel_path().to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::interfaces::ProviderLimits;
    use crate::connector::adapter::{ChunkRecordStore, FlatVectorIndex, PlainSerializer};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct StubProvider;

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn provider_tag(&self) -> &str {
            "mock"
        }

        fn limits(&self) -> ProviderLimits {
            ProviderLimits {
                max_tokens_per_request: 8000,
                recommended_batch_size: 8,
                max_concurrency: 2,
                dimensions: 2,
                supported_models: vec!["stub".into()],
            }
        }
    }

    fn processor(base_dir: std::path::PathBuf) -> StreamingProcessor {
        let vector_index = Arc::new(FlatVectorIndex::open(&base_dir).unwrap());
        let chunk_store = Arc::new(ChunkRecordStore::open(&base_dir, "repo-1", "mock", "v1", Arc::new(PlainSerializer)).unwrap());
        StreamingProcessor::new(
            Arc::new(StubProvider),
            Arc::new(MemoryMonitor::new(100_000)),
            Arc::new(CheckpointManager::new(base_dir)),
            Arc::new(Orchestrator::new()),
            vector_index,
            chunk_store,
            4,
        )
    }

    #[tokio::test]
    async fn processes_all_files_and_skips_on_resume() {
        let dir = tempdir().unwrap();
        let proc = processor(dir.path().to_path_buf());
        let files = vec![FileToProcess {
            rel_path: "math.py".into(),
            abs_path: "/repo/math.py".into(),
            content_hash: "hash1".into(),
            content: "def multiply(x, y): return x * y\n".into(),
        }];

        let outcome = proc
            .process("repo-1", "index", |_| Language::Python, files)
            .await
            .unwrap();

        assert!(!outcome.embedded.is_empty());
        assert_eq!(outcome.processed_files.len(), 1);
    }

    #[tokio::test]
    async fn zero_embedding_calls_when_all_files_already_processed() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_path_buf());
        let mut checkpoint = manager.init_or_resume("repo-1", "index").unwrap();
        checkpoint.mark_processed(ProcessedFileEntry {
            path: "math.py".into(),
            hash: "hash1".into(),
            chunks: 1,
            processed_at: chrono::Utc::now().to_rfc3339(),
        });
        manager.save(&checkpoint).unwrap();

        let proc = processor(dir.path().to_path_buf());
        let files = vec![FileToProcess {
            rel_path: "math.py".into(),
            abs_path: "/repo/math.py".into(),
            content_hash: "hash1".into(),
            content: "def multiply(x, y): return x * y\n".into(),
        }];
        let outcome = proc
            .process("repo-1", "index", |_| Language::Python, files)
            .await
            .unwrap();
        assert!(outcome.embedded.is_empty());
    }
}
