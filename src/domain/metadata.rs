use regex::Regex;

use crate::domain::models::{ChunkType, Language};

/// Fields derived from a chunk's content for ranking and display (spec §4.E).
/// Extraction never fails; absent fields are simply omitted.
#[derive(Debug, Clone, Default)]
pub struct ExtractedMetadata {
    pub chunk_type: Option<ChunkType>,
    pub function_name: Option<String>,
    pub class_name: Option<String>,
    pub imports: Vec<String>,
    pub signature: Option<String>,
}

struct LanguagePatterns {
    function: &'static str,
    class: &'static str,
    import: &'static str,
    comment_prefixes: &'static [&'static str],
}

fn patterns_for(language: Language) -> LanguagePatterns {
    match language {
        Language::Rust => LanguagePatterns {
            function: r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)",
            class: r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+([A-Za-z_][A-Za-z0-9_]*)",
            import: r#"^\s*use\s+([A-Za-z0-9_:]+)"#,
            comment_prefixes: &["//", "/*", "///", "//!"],
        },
        Language::Python => LanguagePatterns {
            function: r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)",
            class: r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)",
            import: r"^\s*(?:from\s+([A-Za-z0-9_.]+)\s+import|import\s+([A-Za-z0-9_.]+))",
            comment_prefixes: &["#", "\"\"\"", "'''"],
        },
        Language::JavaScript | Language::TypeScript => LanguagePatterns {
            function: r"^\s*(?:export\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)",
            class: r"^\s*(?:export\s+)?(?:default\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)",
            import: r#"^\s*(?:import\s+.*?from\s+['"]([^'"]+)['"]|const\s+.*?=\s*require\(['"]([^'"]+)['"]\))"#,
            comment_prefixes: &["//", "/*"],
        },
        Language::Go => LanguagePatterns {
            function: r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)",
            class: r"^\s*type\s+([A-Za-z_][A-Za-z0-9_]*)\s+(?:struct|interface)",
            import: r#"^\s*import\s+\(?\s*"?([A-Za-z0-9_./]+)"?"#,
            comment_prefixes: &["//", "/*"],
        },
        Language::Php => LanguagePatterns {
            function: r"^\s*(?:public\s+|private\s+|protected\s+|static\s+)*function\s+([A-Za-z_][A-Za-z0-9_]*)",
            class: r"^\s*(?:abstract\s+)?class\s+([A-Za-z_][A-Za-z0-9_]*)",
            import: r#"^\s*(?:require|require_once|include|include_once)\s*\(?['"]([^'"]+)['"]"#,
            comment_prefixes: &["//", "#", "/*"],
        },
        Language::HCL | Language::Unknown => LanguagePatterns {
            function: r"^\s*(?:resource|data|module)\s+\"([A-Za-z0-9_]+)\"",
            class: r"^\s*variable\s+\"([A-Za-z0-9_]+)\"",
            import: r#"^\s*source\s*=\s*"([^"]+)""#,
            comment_prefixes: &["#", "//"],
        },
    }
}

/// Derives language/type/symbol/import/signature fields for one chunk.
pub fn extract_metadata(content: &str, language: Language) -> ExtractedMetadata {
    let patterns = patterns_for(language);
    let trimmed = content.trim_start();

    if patterns
        .comment_prefixes
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
    {
        return ExtractedMetadata {
            chunk_type: Some(ChunkType::Comment),
            ..Default::default()
        };
    }

    if let Ok(re) = Regex::new(patterns.import) {
        let imports: Vec<String> = re
            .captures_iter(content)
            .filter_map(|cap| cap.iter().skip(1).find_map(|m| m.map(|m| m.as_str().to_string())))
            .collect();
        if !imports.is_empty() {
            return ExtractedMetadata {
                chunk_type: Some(ChunkType::Import),
                imports,
                ..Default::default()
            };
        }
    }

    if let Ok(re) = Regex::new(patterns.function) {
        if let Some(cap) = re.captures(content) {
            let name = cap.get(1).map(|m| m.as_str().to_string());
            let signature = first_matching_line(content, &re);
            return ExtractedMetadata {
                chunk_type: Some(ChunkType::Function),
                function_name: name,
                signature,
                ..Default::default()
            };
        }
    }

    if let Ok(re) = Regex::new(patterns.class) {
        if let Some(cap) = re.captures(content) {
            let name = cap.get(1).map(|m| m.as_str().to_string());
            let signature = first_matching_line(content, &re);
            return ExtractedMetadata {
                chunk_type: Some(ChunkType::Class),
                class_name: name,
                signature,
                ..Default::default()
            };
        }
    }

    ExtractedMetadata {
        chunk_type: Some(ChunkType::Code),
        ..Default::default()
    }
}

fn first_matching_line(content: &str, re: &Regex) -> Option<String> {
    content
        .lines()
        .find(|line| re.is_match(line))
        .map(|line| line.trim().to_string())
}

/// Up to `k` lines immediately before `start_line` and after `end_line`
/// (1-based, inclusive) read from the full file (spec §4.E).
pub fn surrounding_context(file_lines: &[&str], start_line: u32, end_line: u32, k: usize) -> (Vec<String>, Vec<String>) {
    let start_idx = start_line.saturating_sub(1) as usize;
    let before_from = start_idx.saturating_sub(k);
    let before = file_lines[before_from..start_idx.min(file_lines.len())]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let end_idx = end_line as usize;
    let after_to = (end_idx + k).min(file_lines.len());
    let after = if end_idx < file_lines.len() {
        file_lines[end_idx..after_to].iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };

    (before, after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_python_function() {
        let meta = extract_metadata("def multiply(x, y): return x * y", Language::Python);
        assert_eq!(meta.chunk_type, Some(ChunkType::Function));
        assert_eq!(meta.function_name.as_deref(), Some("multiply"));
        assert!(meta.signature.unwrap().starts_with("def multiply"));
    }

    #[test]
    fn recognizes_rust_struct_as_class() {
        let meta = extract_metadata("pub struct Repository {\n    id: String,\n}", Language::Rust);
        assert_eq!(meta.chunk_type, Some(ChunkType::Class));
        assert_eq!(meta.class_name.as_deref(), Some("Repository"));
    }

    #[test]
    fn recognizes_js_import() {
        let meta = extract_metadata("import { foo } from 'bar';", Language::JavaScript);
        assert_eq!(meta.chunk_type, Some(ChunkType::Import));
        assert_eq!(meta.imports, vec!["bar".to_string()]);
    }

    #[test]
    fn recognizes_comment() {
        let meta = extract_metadata("// a short remark\nlet x = 1;", Language::JavaScript);
        assert_eq!(meta.chunk_type, Some(ChunkType::Comment));
    }

    #[test]
    fn falls_back_to_code() {
        let meta = extract_metadata("x = x + 1", Language::Python);
        assert_eq!(meta.chunk_type, Some(ChunkType::Code));
    }

    #[test]
    fn surrounding_context_respects_bounds() {
        let lines = vec!["a", "b", "c", "d", "e"];
        let (before, after) = surrounding_context(&lines, 3, 3, 2);
        assert_eq!(before, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(after, vec!["d".to_string(), "e".to_string()]);
    }
}
