use async_trait::async_trait;

use crate::domain::error::{ProviderErrorKind, ZiriError};

/// Capability report a provider declares about itself (spec §4.F).
#[derive(Debug, Clone)]
pub struct ProviderLimits {
    pub max_tokens_per_request: u32,
    pub recommended_batch_size: usize,
    pub max_concurrency: usize,
    pub dimensions: usize,
    pub supported_models: Vec<String>,
}

/// Retry/backoff policy for one provider tag (spec §4.F table).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
    pub rate_limit_delay_ms: Option<u64>,
}

/// Illustrative per-provider policy table from spec §4.F.
pub fn retry_policy_for(provider_tag: &str) -> RetryPolicy {
    match provider_tag {
        "openai" => RetryPolicy {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            jitter: true,
            rate_limit_delay_ms: Some(60_000),
        },
        "ollama" => RetryPolicy {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
            multiplier: 1.5,
            jitter: false,
            rate_limit_delay_ms: None,
        },
        "huggingface" => RetryPolicy {
            max_retries: 4,
            base_delay_ms: 2_000,
            max_delay_ms: 120_000,
            multiplier: 2.5,
            jitter: true,
            rate_limit_delay_ms: Some(3_600_000),
        },
        "cohere" => RetryPolicy {
            max_retries: 4,
            base_delay_ms: 1_500,
            max_delay_ms: 45_000,
            multiplier: 2.0,
            jitter: true,
            rate_limit_delay_ms: Some(60_000),
        },
        _ => RetryPolicy {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: true,
            rate_limit_delay_ms: Some(30_000),
        },
    }
}

/// `Auth`/`ClientInput` fail immediately; `RateLimit` uses the dedicated
/// delay branch; `Network`/`Timeout`/`Server` retry with backoff + jitter.
pub fn classify_should_retry(kind: ProviderErrorKind) -> bool {
    kind.is_retryable()
}

/// Uniform embedding-provider contract (spec §4.F).
///
/// Concrete transports (HTTP to OpenAI/Ollama/Hugging Face/Cohere, or a
/// deterministic mock) are connector-layer adapters; the core only depends
/// on this trait.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts, returning one normalized vector per input in
    /// the same order. A batch-level failure is classified via
    /// `ZiriError::Provider` and absorbed by the streaming processor.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError>;

    /// Stable identifier for the retry-policy table and stored metadata
    /// (`"openai"`, `"ollama"`, `"huggingface"`, `"cohere"`, `"mock"`, ...).
    fn provider_tag(&self) -> &str;

    fn limits(&self) -> ProviderLimits;

    fn retry_policy(&self) -> RetryPolicy {
        retry_policy_for(self.provider_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_policy_matches_spec_table() {
        let policy = retry_policy_for("openai");
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.rate_limit_delay_ms, Some(60_000));
    }

    #[test]
    fn unknown_provider_falls_back_to_conservative_defaults() {
        let policy = retry_policy_for("some-new-provider");
        assert_eq!(policy.max_retries, 3);
    }

    #[test]
    fn auth_and_client_input_are_not_retryable() {
        assert!(!classify_should_retry(ProviderErrorKind::Auth));
        assert!(!classify_should_retry(ProviderErrorKind::ClientInput));
        assert!(classify_should_retry(ProviderErrorKind::RateLimit));
    }
}
