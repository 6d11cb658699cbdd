use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::interfaces::{EmbeddingProvider, ProviderLimits};
use crate::domain::error::{ProviderErrorKind, ZiriError};
use crate::domain::models::normalize;

/// Static capability report for one of the four wire contracts named in
/// spec §4.F. Concrete request/response shapes differ per provider; this
/// struct only carries what the core needs (limits + how to build a call).
#[derive(Debug, Clone)]
pub struct HttpProviderSpec {
    pub tag: &'static str,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub max_tokens_per_request: u32,
    pub recommended_batch_size: usize,
    pub max_concurrency: usize,
    pub auth_header: Option<(&'static str, String)>,
}

impl HttpProviderSpec {
    pub fn openai(api_key: String, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            tag: "openai",
            base_url: "https://api.openai.com/v1/embeddings".to_string(),
            model: model.into(),
            dimensions,
            max_tokens_per_request: 8_191,
            recommended_batch_size: 100,
            max_concurrency: 4,
            auth_header: Some(("Authorization", format!("Bearer {api_key}"))),
        }
    }

    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            tag: "ollama",
            base_url: format!("{}/api/embeddings", base_url.into().trim_end_matches('/')),
            model: model.into(),
            dimensions,
            max_tokens_per_request: 2_048,
            recommended_batch_size: 16,
            max_concurrency: 2,
            auth_header: None,
        }
    }

    pub fn huggingface(api_key: String, model: impl Into<String>, dimensions: usize) -> Self {
        let model = model.into();
        Self {
            tag: "huggingface",
            base_url: format!("https://api-inference.huggingface.co/models/{model}"),
            model,
            dimensions,
            max_tokens_per_request: 512,
            recommended_batch_size: 8,
            max_concurrency: 2,
            auth_header: Some(("Authorization", format!("Bearer {api_key}"))),
        }
    }

    pub fn cohere(api_key: String, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            tag: "cohere",
            base_url: "https://api.cohere.com/v1/embed".to_string(),
            model: model.into(),
            dimensions,
            max_tokens_per_request: 2_048,
            recommended_batch_size: 96,
            max_concurrency: 4,
            auth_header: Some(("Authorization", format!("Bearer {api_key}"))),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Deserialize)]
struct CohereResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

/// HTTP client for the generic embedding-provider wire contract of spec §6:
/// `embed(texts) -> [[f32;d]]` plus a capability report. One instance per
/// provider tag; the concrete request/response shape is dispatched on
/// `spec.tag`. Network/JSON failures are classified into the taxonomy of
/// spec §4.F so the streaming processor's retry policy applies uniformly.
pub struct HttpEmbeddingProvider {
    client: Client,
    spec: HttpProviderSpec,
}

impl HttpEmbeddingProvider {
    pub fn new(spec: HttpProviderSpec) -> Self {
        Self {
            client: Client::new(),
            spec,
        }
    }

    fn classify(status: reqwest::StatusCode) -> ProviderErrorKind {
        match status.as_u16() {
            401 | 403 => ProviderErrorKind::Auth,
            429 => ProviderErrorKind::RateLimit,
            400 | 404 | 422 => ProviderErrorKind::ClientInput,
            500..=599 => ProviderErrorKind::Server,
            _ => ProviderErrorKind::Server,
        }
    }

    async fn embed_openai_like(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError> {
        let request = OpenAiRequest {
            input: texts,
            model: &self.spec.model,
        };
        let response = self.send(&request).await?;
        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ZiriError::provider(ProviderErrorKind::Server, format!("malformed response: {e}")))?;
        let mut ordered = vec![Vec::new(); texts.len()];
        for item in parsed.data {
            if item.index < ordered.len() {
                let mut vector = item.embedding;
                normalize(&mut vector);
                ordered[item.index] = vector;
            }
        }
        Ok(ordered)
    }

    async fn embed_cohere(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError> {
        let request = CohereRequest {
            texts,
            model: &self.spec.model,
            input_type: "search_document",
        };
        let response = self.send(&request).await?;
        let parsed: CohereResponse = response
            .json()
            .await
            .map_err(|e| ZiriError::provider(ProviderErrorKind::Server, format!("malformed response: {e}")))?;
        Ok(parsed
            .embeddings
            .into_iter()
            .map(|mut v| {
                normalize(&mut v);
                v
            })
            .collect())
    }

    async fn embed_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let request = OllamaRequest {
                model: &self.spec.model,
                prompt: text,
            };
            let response = self.send(&request).await?;
            let parsed: OllamaResponse = response
                .json()
                .await
                .map_err(|e| ZiriError::provider(ProviderErrorKind::Server, format!("malformed response: {e}")))?;
            let mut vector = parsed.embedding;
            normalize(&mut vector);
            vectors.push(vector);
        }
        Ok(vectors)
    }

    async fn embed_huggingface(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError> {
        let body = serde_json::json!({ "inputs": texts });
        let response = self.send(&body).await?;
        let parsed: Value = response
            .json()
            .await
            .map_err(|e| ZiriError::provider(ProviderErrorKind::Server, format!("malformed response: {e}")))?;
        let rows = parsed
            .as_array()
            .ok_or_else(|| ZiriError::provider(ProviderErrorKind::Server, "expected a JSON array of vectors"))?;
        let mut vectors = Vec::with_capacity(rows.len());
        for row in rows {
            let mut vector: Vec<f32> = row
                .as_array()
                .ok_or_else(|| ZiriError::provider(ProviderErrorKind::Server, "expected a vector array"))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            normalize(&mut vector);
            vectors.push(vector);
        }
        Ok(vectors)
    }

    async fn send(&self, body: &impl Serialize) -> Result<reqwest::Response, ZiriError> {
        let mut request = self.client.post(&self.spec.base_url).json(body);
        if let Some((name, value)) = &self.spec.auth_header {
            request = request.header(*name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ZiriError::provider(ProviderErrorKind::Timeout, e.to_string())
            } else {
                ZiriError::provider(ProviderErrorKind::Network, e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let kind = Self::classify(response.status());
            let message = response.text().await.unwrap_or_default();
            return Err(ZiriError::provider(kind, message));
        }

        Ok(response)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ZiriError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match self.spec.tag {
            "openai" => self.embed_openai_like(texts).await,
            "cohere" => self.embed_cohere(texts).await,
            "ollama" => self.embed_ollama(texts).await,
            "huggingface" => self.embed_huggingface(texts).await,
            other => Err(ZiriError::input(format!("unknown provider tag: {other}"))),
        }
    }

    fn provider_tag(&self) -> &str {
        self.spec.tag
    }

    fn limits(&self) -> ProviderLimits {
        ProviderLimits {
            max_tokens_per_request: self.spec.max_tokens_per_request,
            recommended_batch_size: self.spec.recommended_batch_size,
            max_concurrency: self.spec.max_concurrency,
            dimensions: self.spec.dimensions,
            supported_models: vec![self.spec.model.clone()],
        }
    }
}
