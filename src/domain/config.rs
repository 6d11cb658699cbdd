use std::path::PathBuf;

use crate::domain::error::ZiriError;

const DEFAULT_PROVIDER: &str = "mock";
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_MEMORY_LIMIT_MB: u64 = 1024;

/// Top-level runtime configuration for an orchestrator run (spec §6, ambient).
///
/// Precedence, highest first: explicit CLI flag > environment variable >
/// hard default. No hidden global singleton — every use case takes one of
/// these by value (REDESIGN FLAGS: "make config explicit").
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub home: PathBuf,
    pub default_provider: String,
    pub concurrency: usize,
    pub batch_size: usize,
    pub memory_limit_mb: u64,
    pub exclude: Vec<String>,
    pub force_full: bool,
}

impl OrchestratorConfig {
    /// Starts from environment variables, falling back to hard defaults.
    pub fn from_env() -> Result<Self, ZiriError> {
        let home = std::env::var("ZIRI_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home());
        let default_provider =
            std::env::var("ZIRI_DEFAULT_PROVIDER").unwrap_or_else(|_| DEFAULT_PROVIDER.to_string());
        let concurrency = parse_positive_env("ZIRI_CONCURRENCY", DEFAULT_CONCURRENCY)?;
        let batch_size = parse_positive_env("ZIRI_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        let memory_limit_mb = parse_positive_env("ZIRI_MEMORY_LIMIT", DEFAULT_MEMORY_LIMIT_MB as usize)? as u64;

        Ok(Self {
            home,
            default_provider,
            concurrency,
            batch_size,
            memory_limit_mb,
            exclude: Vec::new(),
            force_full: false,
        })
    }

    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        if let Some(provider) = provider {
            self.default_provider = provider;
        }
        self
    }

    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        if let Some(concurrency) = concurrency {
            self.concurrency = concurrency;
        }
        self
    }

    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        if let Some(batch_size) = batch_size {
            self.batch_size = batch_size;
        }
        self
    }

    pub fn with_memory_limit_mb(mut self, memory_limit_mb: Option<u64>) -> Self {
        if let Some(memory_limit_mb) = memory_limit_mb {
            self.memory_limit_mb = memory_limit_mb;
        }
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_force_full(mut self, force_full: bool) -> Self {
        self.force_full = force_full;
        self
    }
}

fn default_home() -> PathBuf {
    dirs_home().join(".ziri")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn parse_positive_env(key: &str, default: usize) -> Result<usize, ZiriError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => value
            .parse::<usize>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| ZiriError::input(format!("{key} must be a positive integer, got '{value}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_take_precedence_over_defaults() {
        let config = OrchestratorConfig {
            home: PathBuf::from("/tmp/ziri"),
            default_provider: DEFAULT_PROVIDER.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            exclude: Vec::new(),
            force_full: false,
        }
        .with_provider(Some("openai".to_string()))
        .with_concurrency(Some(8));

        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }
}
