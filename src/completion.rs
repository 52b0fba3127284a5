//! Completion provider implementations.
//!
//! - **[`DisabledCompleter`]**: always unavailable.
//! - **[`OpenAICompleter`]**: `POST {url}/chat/completions` on any
//!   OpenAI-compatible API (OpenAI itself, or Ollama's `/v1` endpoint).

use anyhow::{bail, Result};
use async_trait::async_trait;
use mindforge_core::rag::{CompletionError, CompletionProvider};

use crate::config::CompletionConfig;
use crate::http::{self, HttpError};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";

impl From<HttpError> for CompletionError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Unavailable(msg) => CompletionError::Unavailable(msg),
            HttpError::Decode(msg) => CompletionError::Malformed(msg),
        }
    }
}

pub struct DisabledCompleter;

#[async_trait]
impl CompletionProvider for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable(
            "completion provider is disabled".to_string(),
        ))
    }
}

/// Chat-completions client. Each prompt is sent as a single user message.
pub struct OpenAICompleter {
    model: String,
    temperature: f32,
    url: String,
    api_key_env: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
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
impl CompletionProvider for OpenAICompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let api_key = http::api_key(&self.api_key_env).ok_or_else(|| {
            CompletionError::Unavailable(format!("{} not set", self.api_key_env))
        })?;
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });
        let json = http::post_json(
            &self.client,
            &format!("{}/chat/completions", self.url.trim_end_matches('/')),
            Some(&api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, CompletionError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| CompletionError::Malformed("missing choices[0].message.content".to_string()))
}

/// Create the [`CompletionProvider`] named by `config.provider`.
pub fn create_completer(config: &CompletionConfig) -> Result<Box<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledCompleter)),
        "openai" => Ok(Box::new(OpenAICompleter::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  Mitochondria.\n"}}]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "  Mitochondria.\n");
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = parse_chat_response(&serde_json::json!({"choices": []})).unwrap_err();
        assert!(matches!(err, CompletionError::Malformed(_)));
    }

    #[tokio::test]
    async fn disabled_completer_is_unavailable() {
        assert!(DisabledCompleter.complete("hi").await.is_err());
    }

    #[test]
    fn factory_dispatches_on_provider() {
        let mut config = CompletionConfig::default();
        assert_eq!(create_completer(&config).unwrap().model_name(), "gpt-3.5-turbo");
        config.provider = "disabled".to_string();
        assert_eq!(create_completer(&config).unwrap().model_name(), "disabled");
    }
}
