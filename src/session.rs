//! Per-unit session state.
//!
//! A [`Session`] is the in-memory view of one open unit: notes, chat
//! transcript, last analysis, and at most one embedding index. It is
//! created when the unit is opened and dropped when another unit is opened
//! or the workspace is closed. Providers are passed in explicitly through
//! [`Services`] on every call.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use mindforge_core::embedding::{embed_query, EmbeddingProvider};
use mindforge_core::index::{build_index, EmbeddingIndex, SearchHit};
use mindforge_core::models::{ChatMessage, Document, SourceKind};
use mindforge_core::rag::{CompletionProvider, Responder};
use mindforge_core::segment::SegmentStrategy;
use mindforge_core::study::{self, truncate_chars, Quiz};
use tracing::{info, warn};

use crate::completion::create_completer;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::create_embedder;
use crate::extract::load_document;
use crate::index_store::{load_index, remove_index, save_index};
use crate::units::{Analysis, UnitStore};

/// Characters of document text kept as quiz material.
const QUIZ_SOURCE_CHARS: usize = 4000;

/// Providers and tuning shared by every session operation.
pub struct Services {
    pub embedder: Box<dyn EmbeddingProvider>,
    pub completer: Box<dyn CompletionProvider>,
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub batch_size: usize,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            embedder: create_embedder(&config.embedding)?,
            completer: create_completer(&config.completion)?,
            chunking: config.chunking.clone(),
            top_k: config.retrieval.top_k,
            batch_size: config.embedding.batch_size,
        })
    }

    /// Services with default chunking and retrieval settings.
    pub fn new(
        embedder: Box<dyn EmbeddingProvider>,
        completer: Box<dyn CompletionProvider>,
    ) -> Self {
        let config = Config::default();
        Self {
            embedder,
            completer,
            chunking: config.chunking,
            top_k: config.retrieval.top_k,
            batch_size: config.embedding.batch_size,
        }
    }

    /// Splitter and window for a document source.
    ///
    /// Uploaded files get the boundary-aware splitter; transcripts and
    /// pasted text use the plain window, transcripts with their own size.
    pub fn segmentation(&self, source: SourceKind) -> (SegmentStrategy, usize, usize) {
        let c = &self.chunking;
        match source {
            SourceKind::File => (SegmentStrategy::Boundary, c.chunk_size, c.overlap),
            SourceKind::Video => (SegmentStrategy::Fixed, c.video_chunk_size, c.video_overlap),
            SourceKind::Text => (SegmentStrategy::Fixed, c.chunk_size, c.overlap),
        }
    }

    pub fn responder(&self) -> Responder<'_> {
        Responder::new(self.embedder.as_ref(), self.completer.as_ref()).with_top_k(self.top_k)
    }
}

/// One open unit.
pub struct Session {
    store: UnitStore,
    unit: String,
    dir: PathBuf,
    notes: String,
    chat: Vec<ChatMessage>,
    index: Option<EmbeddingIndex>,
    analysis: Option<Analysis>,
}

impl Session {
    /// Load a unit's saved state. A missing or unreadable index leaves the
    /// session without retrieval rather than failing.
    pub fn open(store: &UnitStore, unit: &str) -> Result<Self> {
        let dir = store.unit_dir(unit)?;
        let index = load_index(&dir);
        let session = Self {
            store: store.clone(),
            unit: unit.to_string(),
            notes: store.load_notes(unit)?,
            chat: store.load_chat(unit)?,
            analysis: store.load_analysis(unit)?,
            index,
            dir,
        };
        info!(
            unit,
            indexed = session.index.is_some(),
            messages = session.chat.len(),
            "opened unit"
        );
        Ok(session)
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn index(&self) -> Option<&EmbeddingIndex> {
        self.index.as_ref()
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    /// Segment, summarize, map, and index `document`, replacing the unit's
    /// previous index and analysis.
    ///
    /// Provider failures do not fail the analysis: the summary carries the
    /// error text, the concept map comes back empty, and a failed index
    /// build leaves the unit without retrieval (any stale saved index is
    /// removed).
    pub async fn analyze(&mut self, document: &Document, services: &Services) -> Result<Analysis> {
        let (strategy, chunk_size, overlap) = services.segmentation(document.source);
        let chunks = strategy
            .segment(&document.text, chunk_size, overlap)
            .context("Failed to segment document")?;
        let Some(first) = chunks.first() else {
            bail!("Document '{}' contains no text", document.name);
        };
        info!(
            unit = %self.unit,
            document = %document.name,
            chunks = chunks.len(),
            ?strategy,
            "analyzing document"
        );

        let summary = study::summarize(services.completer.as_ref(), &first.text).await;
        let concept_map = study::concept_map(services.completer.as_ref(), &first.text).await;

        self.index = build_index(services.embedder.as_ref(), &chunks, services.batch_size).await;
        let persisted = match &self.index {
            Some(index) => save_index(index, &self.dir),
            None => remove_index(&self.dir),
        };
        if let Err(e) = persisted {
            warn!(unit = %self.unit, error = %format!("{:#}", e), "index not persisted");
        }

        let analysis = Analysis {
            document: document.name.clone(),
            source: document.source,
            strategy,
            chunk_count: chunks.len(),
            indexed: self.index.is_some(),
            summary,
            concept_map,
            excerpt: truncate_chars(&document.text, QUIZ_SOURCE_CHARS).to_string(),
            analyzed_at: Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.store.save_analysis(&self.unit, &analysis) {
            warn!(unit = %self.unit, error = %format!("{:#}", e), "analysis not persisted");
        }
        self.analysis = Some(analysis.clone());
        Ok(analysis)
    }

    /// One chat turn. The transcript is saved after every exchange; a save
    /// failure is logged and the answer is still returned.
    pub async fn ask(&mut self, query: &str, services: &Services) -> String {
        self.chat.push(ChatMessage::user(query));
        let answer = services.responder().answer(query, self.index.as_ref()).await;
        self.chat.push(ChatMessage::assistant(answer.clone()));

        if let Err(e) = self.store.save_chat(&self.unit, &self.chat) {
            warn!(unit = %self.unit, error = %format!("{:#}", e), "chat not persisted");
        }
        answer
    }

    /// Raw retrieval: the `k` chunks closest to `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        services: &Services,
    ) -> Result<Vec<SearchHit<'_>>> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| anyhow!("Unit '{}' has no index; analyze a document first", self.unit))?;
        let vector = embed_query(services.embedder.as_ref(), query).await?;
        Ok(index.search(&vector, k)?)
    }

    pub fn save_notes(&mut self, notes: &str) -> Result<()> {
        self.store.save_notes(&self.unit, notes)?;
        self.notes = notes.to_string();
        Ok(())
    }

    pub fn clear_chat(&mut self) -> Result<()> {
        self.chat.clear();
        self.store.save_chat(&self.unit, &self.chat)
    }

    /// Text to build a quiz from: the last analyzed document, else the
    /// unit's first stored resource, else the indexed chunks.
    fn quiz_source(&self) -> Option<String> {
        if let Some(analysis) = self.analysis.as_ref().filter(|a| !a.excerpt.is_empty()) {
            return Some(analysis.excerpt.clone());
        }

        let first_resource = self
            .store
            .get(&self.unit)
            .ok()
            .and_then(|u| u.info.resources.first().cloned());
        if let Some(resource) = first_resource {
            match self
                .store
                .resource_path(&self.unit, &resource.name)
                .and_then(|p| load_document(&p))
            {
                Ok(doc) => return Some(truncate_chars(&doc.text, QUIZ_SOURCE_CHARS).to_string()),
                Err(e) => warn!(resource = %resource.name, error = %format!("{:#}", e), "resource unreadable"),
            }
        }

        self.index.as_ref().map(|index| {
            let joined = index
                .entries()
                .iter()
                .map(|e| e.chunk.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            truncate_chars(&joined, QUIZ_SOURCE_CHARS).to_string()
        })
    }

    pub async fn generate_quiz(&self, services: &Services) -> Result<Quiz> {
        let source = self
            .quiz_source()
            .ok_or_else(|| anyhow!("Nothing to quiz on yet; analyze a document first"))?;
        study::quiz(services.completer.as_ref(), &source)
            .await
            .map_err(|e| anyhow!("Quiz Error: {}", e))
    }
}

/// Holds at most one open [`Session`].
pub struct Workspace {
    store: UnitStore,
    current: Option<Session>,
}

impl Workspace {
    pub fn new(store: UnitStore) -> Self {
        Self {
            store,
            current: None,
        }
    }

    pub fn store(&self) -> &UnitStore {
        &self.store
    }

    /// Open `unit`, discarding the current session (and its index) first.
    pub fn open(&mut self, unit: &str) -> Result<&mut Session> {
        self.close();
        let session = Session::open(&self.store, unit)?;
        Ok(self.current.insert(session))
    }

    pub fn close(&mut self) {
        if let Some(previous) = self.current.take() {
            info!(unit = previous.unit(), "closed unit");
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Session> {
        self.current.as_mut()
    }
}
