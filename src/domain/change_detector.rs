use std::collections::HashMap;

use crate::domain::models::FileRecord;

/// Classification of a file relative to the previous manifest (spec §4.C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Added,
    Modified,
    Deleted,
    Unchanged,
}

/// A file discovered by the current walk, before it is chunked.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub rel_path: String,
    pub abs_path: String,
    pub content_hash: String,
    pub size: u64,
    pub mtime: i64,
}

/// Diffs the current walk against the previous manifest.
///
/// Returns `(rel_path, classification)` pairs for every path that appears in
/// either the walk or the manifest. Modification time is advisory only — the
/// classification is always driven by the content hash (spec §4.C).
pub fn classify_changes(
    current: &[WalkedFile],
    previous: &HashMap<String, FileRecord>,
) -> Vec<(String, FileChange)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for file in current {
        seen.insert(file.rel_path.clone());
        match previous.get(&file.rel_path) {
            None => out.push((file.rel_path.clone(), FileChange::Added)),
            Some(record) if record.content_hash() != file.content_hash => {
                out.push((file.rel_path.clone(), FileChange::Modified))
            }
            Some(_) => out.push((file.rel_path.clone(), FileChange::Unchanged)),
        }
    }

    for rel_path in previous.keys() {
        if !seen.contains(rel_path) {
            out.push((rel_path.clone(), FileChange::Deleted));
        }
    }

    out
}
