//! Embedding provider implementations.
//!
//! The [`EmbeddingProvider`] trait and vector helpers live in
//! `mindforge_core::embedding`; this module supplies the backends:
//! - **[`DisabledEmbedder`]**: always unavailable; used when embeddings are switched off.
//! - **[`OpenAIEmbedder`]**: `POST {url}/embeddings` on any OpenAI-compatible API.
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama instance.
//!
//! Use [`create_embedder`] to pick one from configuration. Retry and backoff
//! are handled by [`crate::http::post_json`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use mindforge_core::embedding::{EmbeddingError, EmbeddingProvider};

use crate::config::EmbeddingConfig;
use crate::http::{self, HttpError};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

impl From<HttpError> for EmbeddingError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Unavailable(msg) => EmbeddingError::Unavailable(msg),
            HttpError::Decode(msg) => EmbeddingError::Malformed(msg),
        }
    }
}

// ============ Disabled ============

/// Embedder used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Unavailable(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI ============

/// Embedder for the OpenAI embeddings API.
///
/// The API key is read from the environment variable named by
/// `embedding.api_key_env` on every call, so a missing key surfaces as
/// [`EmbeddingError::Unavailable`] rather than a construction failure.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    url: String,
    api_key_env: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: config.model_or_default(),
            dims: config.dims_or_default(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            api_key_env: config.api_key_env.clone(),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let api_key = http::api_key(&self.api_key_env).ok_or_else(|| {
            EmbeddingError::Unavailable(format!("{} not set", self.api_key_env))
        })?;
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = http::post_json(
            &self.client,
            &format!("{}/embeddings", self.url.trim_end_matches('/')),
            Some(&api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index` when present.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbeddingError::Malformed("missing data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EmbeddingError::Malformed("missing embedding".to_string()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, to_f32_vec(embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn to_f32_vec(values: &[serde_json::Value]) -> Result<Vec<f32>, EmbeddingError> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbeddingError::Malformed(format!("non-numeric component: {}", v)))
        })
        .collect()
}

// ============ Ollama ============

/// Embedder for a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: config.model_or_default(),
            dims: config.dims_or_default(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = http::post_json(
            &self.client,
            &format!("{}/api/embed", self.url.trim_end_matches('/')),
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbeddingError::Malformed("missing embeddings array".to_string()))?;

    embeddings
        .iter()
        .map(|embedding| {
            let values = embedding.as_array().ok_or_else(|| {
                EmbeddingError::Malformed("embedding is not an array".to_string())
            })?;
            to_f32_vec(values)
        })
        .collect()
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "openai" => Ok(Box::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_response_is_ordered_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn openai_response_without_data_is_malformed() {
        let err = parse_openai_response(&serde_json::json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, EmbeddingError::Malformed(_)));
    }

    #[test]
    fn non_numeric_component_is_malformed() {
        let json = serde_json::json!({"embeddings": [[1.0, "x"]]});
        assert!(parse_ollama_response(&json).is_err());
    }

    #[test]
    fn ollama_response_parses() {
        let json = serde_json::json!({"embeddings": [[0.5, 0.25], [1.0, 2.0]]});
        assert_eq!(
            parse_ollama_response(&json).unwrap(),
            vec![vec![0.5, 0.25], vec![1.0, 2.0]]
        );
    }

    #[tokio::test]
    async fn disabled_embedder_is_unavailable() {
        let err = DisabledEmbedder.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }

    #[tokio::test]
    async fn openai_without_key_is_unavailable() {
        let config = EmbeddingConfig {
            api_key_env: "MINDFORGE_TEST_NO_SUCH_KEY".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAIEmbedder::new(&config).unwrap();
        let err = embedder.embed(&["x".to_string()]).await.unwrap_err();
        assert_eq!(
            err,
            EmbeddingError::Unavailable("MINDFORGE_TEST_NO_SUCH_KEY not set".to_string())
        );
    }

    #[test]
    fn factory_dispatches_on_provider() {
        let mut config = EmbeddingConfig::default();
        assert_eq!(
            create_embedder(&config).unwrap().model_name(),
            "text-embedding-3-small"
        );
        config.provider = "ollama".to_string();
        assert_eq!(create_embedder(&config).unwrap().dims(), 768);
        config.provider = "disabled".to_string();
        assert_eq!(create_embedder(&config).unwrap().model_name(), "disabled");
        config.provider = "faiss".to_string();
        assert!(create_embedder(&config).is_err());
    }
}
