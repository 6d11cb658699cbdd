use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::error::ZiriError;

const DEFAULT_SAVE_EVERY_N: usize = 100;
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_MAX_CHECKPOINTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFileEntry {
    pub path: String,
    pub hash: String,
    pub chunks: u32,
    pub processed_at: String,
}

/// Durable per-operation progress snapshot (spec §3/§4.J).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub repo_id: String,
    pub op_type: String,
    pub start_time: String,
    pub processed_files: Vec<ProcessedFileEntry>,
    pub current_file: Option<String>,
    pub processed_count: u64,
    pub saved_at: String,
    pub completed: bool,
}

impl Checkpoint {
    pub fn fresh(repo_id: impl Into<String>, op_type: impl Into<String>) -> Self {
        let now = iso_now();
        Self {
            repo_id: repo_id.into(),
            op_type: op_type.into(),
            start_time: now.clone(),
            processed_files: Vec::new(),
            current_file: None,
            processed_count: 0,
            saved_at: now,
            completed: false,
        }
    }

    pub fn is_processed(&self, path: &str) -> bool {
        self.processed_files.iter().any(|f| f.path == path)
    }

    pub fn mark_processed(&mut self, entry: ProcessedFileEntry) {
        self.processed_files.push(entry);
        self.processed_count = self.processed_files.len() as u64;
        self.saved_at = iso_now();
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
        self.saved_at = iso_now();
    }
}

/// Owns the `checkpoints/<repo_id>/<op_type>/` directory tree (spec §4.J).
pub struct CheckpointManager {
    base_dir: PathBuf,
    save_every_n: usize,
    max_age: Duration,
    max_checkpoints: usize,
}

impl CheckpointManager {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            save_every_n: DEFAULT_SAVE_EVERY_N,
            max_age: DEFAULT_MAX_AGE,
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
        }
    }

    pub fn save_every_n(&self) -> usize {
        self.save_every_n
    }

    fn op_dir(&self, repo_id: &str, op_type: &str) -> PathBuf {
        self.base_dir.join(repo_id).join(op_type)
    }

    /// Loads the newest checkpoint for resume, or starts fresh if none
    /// exists, the newest is already `completed`, or it has aged out.
    pub fn init_or_resume(&self, repo_id: &str, op_type: &str) -> Result<Checkpoint, ZiriError> {
        let dir = self.op_dir(repo_id, op_type);
        if let Some(path) = self.newest_checkpoint(&dir)? {
            let content = fs::read_to_string(&path)?;
            let checkpoint: Checkpoint = serde_json::from_str(&content)
                .map_err(|e| ZiriError::corrupt(format!("checkpoint {}: {e}", path.display())))?;

            let age_ok = age_of(&path).map(|age| age <= self.max_age).unwrap_or(false);
            if !checkpoint.completed && age_ok {
                info!(repo_id, op_type, processed = checkpoint.processed_count, "resuming from checkpoint");
                return Ok(checkpoint);
            }
            debug!(repo_id, op_type, "ignoring stale or completed checkpoint, starting fresh");
        }
        Ok(Checkpoint::fresh(repo_id, op_type))
    }

    /// Writes the checkpoint via write-to-tmp + atomic rename, then prunes
    /// old checkpoints beyond `max_checkpoints`.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), ZiriError> {
        let dir = self.op_dir(&checkpoint.repo_id, &checkpoint.op_type);
        fs::create_dir_all(&dir)?;

        let epoch_ms = epoch_millis();
        let final_path = dir.join(format!("checkpoint-{epoch_ms}.json"));
        let tmp_path = dir.join(format!("checkpoint-{epoch_ms}.json.tmp"));

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| ZiriError::internal(format!("serializing checkpoint: {e}")))?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &final_path)?;

        self.prune(&dir)?;
        Ok(())
    }

    /// Deletes all checkpoints for this operation on successful completion.
    pub fn complete_operation(&self, repo_id: &str, op_type: &str) -> Result<(), ZiriError> {
        let dir = self.op_dir(repo_id, op_type);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    fn newest_checkpoint(&self, dir: &Path) -> Result<Option<PathBuf>, ZiriError> {
        if !dir.exists() {
            return Ok(None);
        }
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        files.sort();
        Ok(files.pop())
    }

    fn prune(&self, dir: &Path) -> Result<(), ZiriError> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        files.sort();
        while files.len() > self.max_checkpoints {
            let oldest = files.remove(0);
            let _ = fs::remove_file(oldest);
        }
        Ok(())
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn age_of(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_checkpoint_starts_empty() {
        let checkpoint = Checkpoint::fresh("repo-1", "index");
        assert_eq!(checkpoint.processed_count, 0);
        assert!(!checkpoint.completed);
    }

    #[test]
    fn save_and_resume_round_trip() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_path_buf());

        let mut checkpoint = manager.init_or_resume("repo-1", "index").unwrap();
        checkpoint.mark_processed(ProcessedFileEntry {
            path: "a.py".into(),
            hash: "h1".into(),
            chunks: 2,
            processed_at: iso_now(),
        });
        manager.save(&checkpoint).unwrap();

        let resumed = manager.init_or_resume("repo-1", "index").unwrap();
        assert_eq!(resumed.processed_count, 1);
        assert!(resumed.is_processed("a.py"));
        assert!(!resumed.is_processed("b.py"));
    }

    #[test]
    fn completed_checkpoint_is_not_resumed() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_path_buf());

        let mut checkpoint = manager.init_or_resume("repo-1", "index").unwrap();
        checkpoint.mark_completed();
        manager.save(&checkpoint).unwrap();

        let fresh = manager.init_or_resume("repo-1", "index").unwrap();
        assert_eq!(fresh.processed_count, 0);
    }

    #[test]
    fn complete_operation_deletes_all_checkpoints() {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_path_buf());
        let checkpoint = manager.init_or_resume("repo-1", "index").unwrap();
        manager.save(&checkpoint).unwrap();

        manager.complete_operation("repo-1", "index").unwrap();
        assert!(!manager.op_dir("repo-1", "index").exists());
    }
}
