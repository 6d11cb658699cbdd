use std::path::Path;
use std::process::Command;

use sha2::{Digest, Sha256};

/// Computes `(id_hex, alias)` for a repository root (spec §4.A).
///
/// If `path` sits inside a VCS checkout, `id = SHA-256(remote_url + "|" + root_commit_sha)`.
/// Otherwise `id = SHA-256(absolute_path)`.
pub fn compute_repo_id(path: &Path) -> (String, String) {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let id = match vcs_identity(&canonical) {
        Some((remote, commit)) => {
            let mut hasher = Sha256::new();
            hasher.update(remote.as_bytes());
            hasher.update(b"|");
            hasher.update(commit.as_bytes());
            format!("{:x}", hasher.finalize())
        }
        None => {
            let mut hasher = Sha256::new();
            hasher.update(canonical.to_string_lossy().as_bytes());
            format!("{:x}", hasher.finalize())
        }
    };
    let alias = sanitize_alias(
        canonical
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repo"),
    );
    (id, alias)
}

/// Best-effort git remote URL + root commit sha lookup. Returns `None` if
/// the path is not a git checkout or git is unavailable — the caller falls
/// back to path-based identity, which is always available.
fn vcs_identity(path: &Path) -> Option<(String, String)> {
    let remote = run_git(path, &["config", "--get", "remote.origin.url"])?;
    let commit = run_git(path, &["rev-list", "--max-parents=0", "HEAD"])?
        .lines()
        .last()?
        .to_string();
    Some((remote.trim().to_string(), commit.trim().to_string()))
}

fn run_git(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").arg("-C").arg(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Keeps `[A-Za-z0-9_-]`, truncates to 64 chars; falls back to `"repo"`.
pub fn sanitize_alias(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let truncated: String = cleaned.chars().take(64).collect();
    if truncated.is_empty() {
        "repo".to_string()
    } else {
        truncated
    }
}

/// The store-directory name for a repository, per spec §4.A: `<alias>--<id[:6]>`.
pub fn store_dir_name(alias: &str, id: &str) -> String {
    format!("{}--{}", alias, &id[..6.min(id.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_disallowed_characters_and_truncates() {
        assert_eq!(sanitize_alias("my repo!@#"), "myrepo");
        assert_eq!(sanitize_alias(""), "repo");
        let long = "a".repeat(100);
        assert_eq!(sanitize_alias(&long).len(), 64);
    }

    #[test]
    fn store_dir_name_is_alias_and_short_id() {
        assert_eq!(store_dir_name("my-repo", "abcdef1234"), "my-repo--abcdef");
    }

    #[test]
    fn compute_repo_id_is_deterministic_for_same_path() {
        let dir = std::env::temp_dir();
        let (id1, alias1) = compute_repo_id(&dir);
        let (id2, alias2) = compute_repo_id(&dir);
        assert_eq!(id1, id2);
        assert_eq!(alias1, alias2);
        assert_eq!(id1.len(), 64);
    }
}
