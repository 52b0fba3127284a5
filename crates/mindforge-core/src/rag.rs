//! Retrieval-augmented answering.
//!
//! [`Responder::answer`] embeds a question with the same provider that
//! built the index, pulls the top-k chunks, and asks the completion
//! provider to answer from that context only. It always returns a string:
//! provider and search failures come back as `"Chat Error: ..."` text so a
//! chat turn can never take the session down.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::{EmbeddingIndex, SearchHit};

/// Returned when there is no index to answer from.
pub const NOT_READY: &str =
    "The study assistant is not ready yet. Analyze a document in this unit first.";

/// Returned for an empty question.
pub const EMPTY_QUERY: &str = "Please enter a question.";

/// Number of chunks retrieved per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 4;

/// Errors returned by a [`CompletionProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Provider unreachable, unauthenticated, disabled, or out of retries.
    #[error("completion provider unavailable: {0}")]
    Unavailable(String),
    /// The provider answered without any completion text.
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

/// Trait for text-completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;
    /// Complete a single natural-language prompt.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Prompt asking the model to answer `question` from `context` alone.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use only the following context to answer the question. \
         If the answer is not in the context, say that you don't know.\n\n\
         Context:\n{}\n\nQuestion: {}\n\nAnswer:",
        context, question
    )
}

/// Join retrieved chunks into one context block.
pub fn join_context(hits: &[SearchHit<'_>]) -> String {
    hits.iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Answers questions against a unit's index.
pub struct Responder<'a> {
    embedder: &'a dyn EmbeddingProvider,
    completer: &'a dyn CompletionProvider,
    top_k: usize,
}

impl<'a> Responder<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingProvider,
        completer: &'a dyn CompletionProvider,
    ) -> Self {
        Self {
            embedder,
            completer,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Override how many chunks are retrieved (at least one).
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Answer `query` from `index`.
    ///
    /// Returns [`NOT_READY`] without contacting any provider when `index` is
    /// absent or empty. Every failure after that point is rendered as a
    /// `"Chat Error: ..."` string.
    pub async fn answer(&self, query: &str, index: Option<&EmbeddingIndex>) -> String {
        let index = match index {
            Some(index) if !index.is_empty() => index,
            _ => return NOT_READY.to_string(),
        };
        if query.trim().is_empty() {
            return EMPTY_QUERY.to_string();
        }
        if index.model() != self.embedder.model_name() {
            warn!(
                index_model = index.model(),
                embedder_model = self.embedder.model_name(),
                "embedding model mismatch"
            );
            return format!(
                "Chat Error: this unit was indexed with '{}' but the current embedding model is '{}'. Re-analyze the document.",
                index.model(),
                self.embedder.model_name()
            );
        }

        let query_vec = match embed_query(self.embedder, query).await {
            Ok(v) => v,
            Err(e) => return format!("Chat Error: {}", e),
        };
        let hits = match index.search(&query_vec, self.top_k) {
            Ok(hits) => hits,
            Err(e) => return format!("Chat Error: {}", e),
        };
        debug!(
            retrieved = hits.len(),
            top_score = hits.first().map(|h| h.score).unwrap_or(0.0),
            "retrieved context"
        );

        let prompt = build_prompt(&join_context(&hits), query);
        match self.completer.complete(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "completion failed");
                format!("Chat Error: {}", e)
            }
        }
    }
}
