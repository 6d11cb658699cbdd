use serde::{Deserialize, Serialize};

use super::{ChunkType, Language};

/// The set of repositories a query searches (spec §4.N, Glossary `Scope`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    CurrentRepo(String),
    Named(Vec<String>),
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    text: String,
    k: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, k: usize) -> Self {
        Self {
            text: text.into(),
            k: k.max(1),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

/// One ranked query result (spec §4.N). `Legacy` covers records that lack
/// content (e.g. written by an older schema) per the degrade-don't-fail
/// fallback of spec §4.N / §7.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryHit {
    Full {
        repository_id: String,
        file_path: String,
        start_line: u32,
        end_line: u32,
        score: f32,
        content: String,
        language: Language,
        chunk_type: ChunkType,
        function_name: Option<String>,
        class_name: Option<String>,
        imports: Vec<String>,
        signature: Option<String>,
        context_before: Vec<String>,
        context_after: Vec<String>,
        explanation: String,
        vector_id: u32,
    },
    Legacy {
        repository_id: String,
        file_path: String,
        score: f32,
    },
}

impl QueryHit {
    pub fn score(&self) -> f32 {
        match self {
            QueryHit::Full { score, .. } => *score,
            QueryHit::Legacy { score, .. } => *score,
        }
    }

    pub fn repository_id(&self) -> &str {
        match self {
            QueryHit::Full { repository_id, .. } => repository_id,
            QueryHit::Legacy { repository_id, .. } => repository_id,
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            QueryHit::Full { file_path, .. } => file_path,
            QueryHit::Legacy { file_path, .. } => file_path,
        }
    }

    pub fn line_span(&self) -> Option<String> {
        match self {
            QueryHit::Full {
                start_line,
                end_line,
                ..
            } => Some(format!("{start_line}-{end_line}")),
            QueryHit::Legacy { .. } => None,
        }
    }

    pub fn vector_id(&self) -> u32 {
        match self {
            QueryHit::Full { vector_id, .. } => *vector_id,
            QueryHit::Legacy { .. } => u32::MAX,
        }
    }
}

/// Builds the human-readable relevance explanation of spec §4.N.
pub fn explain_hit(
    score: f32,
    function_name: Option<&str>,
    class_name: Option<&str>,
    chunk_type: ChunkType,
) -> String {
    let mut parts = vec![format!("{:.0}% match", score * 100.0)];
    if let Some(name) = function_name {
        parts.push(format!("matches function `{name}`"));
    }
    if let Some(name) = class_name {
        parts.push(format!("matches class `{name}`"));
    }
    parts.push(format!("({chunk_type})"));
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_clamps_k_to_at_least_one() {
        assert_eq!(SearchQuery::new("q", 0).k(), 1);
    }

    #[test]
    fn full_hit_line_span_is_formatted() {
        let hit = QueryHit::Full {
            repository_id: "r".into(),
            file_path: "math.py".into(),
            start_line: 10,
            end_line: 12,
            score: 0.96,
            content: "def multiply(x, y): return x * y".into(),
            language: Language::Python,
            chunk_type: ChunkType::Function,
            function_name: Some("multiply".into()),
            class_name: None,
            imports: vec![],
            signature: None,
            context_before: vec![],
            context_after: vec![],
            explanation: String::new(),
            vector_id: 0,
        };
        assert_eq!(hit.line_span(), Some("10-12".to_string()));
    }

    #[test]
    fn legacy_hit_has_no_line_span() {
        let hit = QueryHit::Legacy {
            repository_id: "r".into(),
            file_path: "old.py".into(),
            score: 0.5,
        };
        assert_eq!(hit.line_span(), None);
    }

    #[test]
    fn explanation_mentions_function_match() {
        let text = explain_hit(0.96, Some("multiply"), None, ChunkType::Function);
        assert!(text.contains("multiply"));
        assert!(text.contains("96%"));
    }
}
