use std::path::Path;

use ignore::WalkBuilder;
use regex::Regex;

use crate::domain::change_detector::WalkedFile;
use crate::domain::error::ZiriError;
use crate::domain::models::compute_file_hash;

/// Default exclude globs (spec §4.B): build/deps dirs, VCS dirs, caches,
/// lock/minified/binary artefacts, media, archives, OS junk, IDE metadata.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/.venv/**",
    "**/venv/**",
    "**/__pycache__/**",
    "**/.cache/**",
    "**/.idea/**",
    "**/.vscode/**",
    "**/*.lock",
    "**/*.min.js",
    "**/*.min.css",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.svg",
    "**/*.ico",
    "**/*.pdf",
    "**/*.zip",
    "**/*.tar",
    "**/*.gz",
    "**/*.7z",
    "**/*.exe",
    "**/*.dll",
    "**/*.so",
    "**/*.dylib",
    "**/*.class",
    "**/*.o",
    "**/.DS_Store",
];

/// Translates one glob pattern to an anchored regex per spec §4.B:
/// a `**/` run ⇒ `(?:.*/)?` (zero-or-more leading path components, so it
/// also matches at the repository root), bare `**` ⇒ `.*`, `*` ⇒ `[^/]*`,
/// `?` ⇒ `.`, other regex metacharacters escaped.
pub fn glob_to_regex(glob: &str) -> Regex {
    let mut pattern = String::from("^");
    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') && chars.get(i + 2) == Some(&'/') => {
                pattern.push_str("(?:.*/)?");
                i += 3;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                pattern.push_str(".*");
                i += 2;
            }
            '*' => {
                pattern.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                pattern.push('.');
                i += 1;
            }
            c if "\\.+^$()[]{}|".contains(c) => {
                pattern.push('\\');
                pattern.push(c);
                i += 1;
            }
            c => {
                pattern.push(c);
                i += 1;
            }
        }
    }
    pattern.push('$');
    Regex::new(&pattern).unwrap_or_else(|_| Regex::new("$^").expect("empty-match fallback regex"))
}

/// Walks a repository root and hashes eligible files (spec §4.B).
pub struct Walker {
    patterns: Vec<Regex>,
}

impl Walker {
    pub fn new(custom_excludes: &[String]) -> Self {
        let patterns = DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(custom_excludes.iter().cloned())
            .map(|glob| glob_to_regex(&glob))
            .collect();
        Self { patterns }
    }

    /// A path (normalized with `/` separators, relative to root) is excluded
    /// iff any pattern matches its full relative form.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(rel_path))
    }

    /// Yields `(rel_path, abs_path, content_hash, size, mtime)` for every
    /// eligible file. Traversal order is not observable by callers.
    pub fn walk(&self, root: &Path) -> Result<Vec<WalkedFile>, ZiriError> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let abs_path = entry.path();
            let rel_path = match abs_path.strip_prefix(root) {
                Ok(p) => p.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            if self.is_excluded(&rel_path) {
                continue;
            }

            let bytes = match std::fs::read(abs_path) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            let metadata = match std::fs::metadata(abs_path) {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);

            files.push(WalkedFile {
                rel_path,
                abs_path: abs_path.to_string_lossy().to_string(),
                content_hash: compute_file_hash(&bytes),
                size: bytes.len() as u64,
                mtime,
            });
        }

        Ok(files)
    }
}
