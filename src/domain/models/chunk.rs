use serde::{Deserialize, Serialize};

use super::Language;

/// A bounded region of a file treated as one embedding unit (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    id: String,
    repository_id: String,
    rel_path: String,
    abs_path: String,
    content: String,
    start_line: u32,
    end_line: u32,
    token_estimate: u32,
    language: Language,
    chunk_type: ChunkType,
    function_name: Option<String>,
    class_name: Option<String>,
    imports: Vec<String>,
    signature: Option<String>,
    context_before: Vec<String>,
    context_after: Vec<String>,
    file_hash: String,
}

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_id: impl Into<String>,
        rel_path: impl Into<String>,
        abs_path: impl Into<String>,
        content: impl Into<String>,
        start_line: u32,
        end_line: u32,
        chunk_index: usize,
        file_hash: impl Into<String>,
        language: Language,
    ) -> Self {
        let rel_path = rel_path.into();
        let repository_id = repository_id.into();
        let file_hash = file_hash.into();
        let content = content.into();
        let token_estimate = estimate_tokens(&content);
        let id = compute_chunk_id(&repository_id, &rel_path, chunk_index, &file_hash);
        Self {
            id,
            repository_id,
            rel_path,
            abs_path: abs_path.into(),
            content,
            start_line,
            end_line,
            token_estimate,
            language,
            chunk_type: ChunkType::Code,
            function_name: None,
            class_name: None,
            imports: Vec::new(),
            signature: None,
            context_before: Vec::new(),
            context_after: Vec::new(),
            file_hash,
        }
    }

    /// Reconstitutes a chunk from a persisted record (used by the chunk store).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repository_id: String,
        rel_path: String,
        abs_path: String,
        content: String,
        start_line: u32,
        end_line: u32,
        token_estimate: u32,
        language: Language,
        chunk_type: ChunkType,
        function_name: Option<String>,
        class_name: Option<String>,
        imports: Vec<String>,
        signature: Option<String>,
        context_before: Vec<String>,
        context_after: Vec<String>,
        file_hash: String,
    ) -> Self {
        Self {
            id,
            repository_id,
            rel_path,
            abs_path,
            content,
            start_line,
            end_line,
            token_estimate,
            language,
            chunk_type,
            function_name,
            class_name,
            imports,
            signature,
            context_before,
            context_after,
            file_hash,
        }
    }

    pub fn with_chunk_type(mut self, chunk_type: ChunkType) -> Self {
        self.chunk_type = chunk_type;
        self
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = Some(name.into());
        self
    }

    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_context(mut self, before: Vec<String>, after: Vec<String>) -> Self {
        self.context_before = before;
        self.context_after = after;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    pub fn abs_path(&self) -> &str {
        &self.abs_path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn token_estimate(&self) -> u32 {
        self.token_estimate
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn context_before(&self) -> &[String] {
        &self.context_before
    }

    pub fn context_after(&self) -> &[String] {
        &self.context_after
    }

    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.rel_path, self.start_line, self.end_line)
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Validates the invariants of spec §3: `1 ≤ start_line ≤ end_line`, non-empty content.
    pub fn is_valid(&self) -> bool {
        self.start_line >= 1 && self.start_line <= self.end_line && !self.content.trim().is_empty()
    }
}

/// Estimate: `ceil(content_len / 4)` per spec §4.G.
pub fn estimate_tokens(content: &str) -> u32 {
    ((content.len() as f64) / 4.0).ceil() as u32
}

/// `ChunkId` derived from `(repo-id, rel-path, chunk-index, file-hash)` (spec §3).
pub fn compute_chunk_id(repository_id: &str, rel_path: &str, chunk_index: usize, file_hash: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(repository_id.as_bytes());
    hasher.update(b"|");
    hasher.update(rel_path.as_bytes());
    hasher.update(b"|");
    hasher.update(chunk_index.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(file_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The kind of code construct a chunk represents (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Class,
    Import,
    Comment,
    Code,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Import => "import",
            ChunkType::Comment => "comment",
            ChunkType::Code => "code",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => ChunkType::Function,
            "class" => ChunkType::Class,
            "import" => ChunkType::Import,
            "comment" => ChunkType::Comment,
            _ => ChunkType::Code,
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
