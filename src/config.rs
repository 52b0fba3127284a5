//! TOML configuration.
//!
//! Every section is optional; a missing file section (or a missing file
//! when no `--config` is given) falls back to the defaults below. See
//! [`load_config`] for the validation rules.
//!
//! ```toml
//! [data]
//! dir = "./data"
//!
//! [chunking]
//! chunk_size = 2000
//! overlap = 200
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [completion]
//! provider = "openai"
//! model = "gpt-3.5-turbo"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("mindforge"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_video_chunk_size")]
    pub video_chunk_size: usize,
    #[serde(default)]
    pub video_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            video_chunk_size: default_video_chunk_size(),
            video_overlap: 0,
        }
    }
}

fn default_chunk_size() -> usize {
    2000
}
fn default_overlap() -> usize {
    200
}
fn default_video_chunk_size() -> usize {
    4000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    mindforge_core::rag::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL. OpenAI defaults to `https://api.openai.com/v1`, Ollama to
    /// `http://localhost:11434`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider.as_str() {
            "ollama" => "nomic-embed-text".to_string(),
            _ => "text-embedding-3-small".to_string(),
        })
    }

    /// Configured dimension, or the known dimension of the default model.
    pub fn dims_or_default(&self) -> usize {
        self.dims.unwrap_or(match self.model_or_default().as_str() {
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            "text-embedding-3-large" => 3072,
            "nomic-embed-text" => 768,
            _ => 0,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_completion_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_completion_model(),
            temperature: default_temperature(),
            url: None,
            api_key_env: default_api_key_env(),
            max_retries: default_completion_retries(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_completion_retries() -> u32 {
    3
}
fn default_completion_timeout() -> u64 {
    60
}

/// Load and validate a config file, or the defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let c = &config.chunking;
    if c.chunk_size == 0 || c.overlap >= c.chunk_size {
        bail!("chunking.overlap must be smaller than chunking.chunk_size (and chunk_size > 0)");
    }
    if c.video_chunk_size == 0 || c.video_overlap >= c.video_chunk_size {
        bail!("chunking.video_overlap must be smaller than chunking.video_chunk_size (and video_chunk_size > 0)");
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    let e = &config.embedding;
    match e.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if e.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if e.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    let m = &config.completion;
    match m.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown completion provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&m.temperature) {
        bail!("completion.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

/// Environment variables that must be set for the configured providers.
///
/// Ollama needs no credential; a custom OpenAI-compatible base URL still
/// reads its key from `api_key_env`.
pub fn required_credentials(config: &Config) -> Vec<&str> {
    let mut vars = Vec::new();
    if config.embedding.provider == "openai" {
        vars.push(config.embedding.api_key_env.as_str());
    }
    if config.completion.provider == "openai"
        && !vars.contains(&config.completion.api_key_env.as_str())
    {
        vars.push(config.completion.api_key_env.as_str());
    }
    vars
}

/// Fail fast when a provider credential is missing.
///
/// Every analysis and chat feature depends on the providers, so this runs
/// before any processing and its message is shown to the user as-is.
pub fn check_credentials(config: &Config) -> Result<()> {
    let missing: Vec<&str> = required_credentials(config)
        .into_iter()
        .filter(|var| std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true))
        .collect();
    if !missing.is_empty() {
        bail!(
            "Missing API credentials: set {} (or switch the provider to \"disabled\" in the config).",
            missing.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(toml_text: &str) -> Result<Config> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml_text.as_bytes()).unwrap();
        load_config(Some(file.path()))
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 2000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.chunking.video_chunk_size, 4000);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.embedding.provider, "openai");
        assert_eq!(cfg.embedding.dims_or_default(), 1536);
        assert_eq!(cfg.completion.model, "gpt-3.5-turbo");
        assert!((cfg.completion.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_overlap_not_below_chunk_size() {
        let err = parse("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!(parse("[embedding]\nprovider = \"faiss\"\n").is_err());
        assert!(parse("[completion]\nprovider = \"ollama\"\n").is_err());
    }

    #[test]
    fn rejects_zero_top_k_and_bad_temperature() {
        assert!(parse("[retrieval]\ntop_k = 0\n").is_err());
        assert!(parse("[completion]\ntemperature = 3.5\n").is_err());
    }

    #[test]
    fn disabled_providers_need_no_credentials() {
        let cfg = parse(
            "[embedding]\nprovider = \"disabled\"\n[completion]\nprovider = \"disabled\"\n",
        )
        .unwrap();
        assert!(required_credentials(&cfg).is_empty());
        assert!(check_credentials(&cfg).is_ok());
    }

    #[test]
    fn shared_key_is_listed_once() {
        let cfg = Config::default();
        assert_eq!(required_credentials(&cfg), vec!["OPENAI_API_KEY"]);
    }

    #[test]
    fn missing_credential_is_reported_by_name() {
        let cfg = parse(
            "[embedding]\napi_key_env = \"MINDFORGE_TEST_UNSET_KEY\"\n[completion]\nprovider = \"disabled\"\n",
        )
        .unwrap();
        let err = check_credentials(&cfg).unwrap_err();
        assert!(err.to_string().contains("MINDFORGE_TEST_UNSET_KEY"));
    }
}
