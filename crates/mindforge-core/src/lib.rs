//! # MindForge Core
//!
//! Shared, WASM-safe logic for MindForge: data models, text segmentation,
//! the embedding index, the retrieval-augmented responder, and the
//! study-output parsers (summary, concept map, quiz).
//!
//! This crate contains no tokio runtime, HTTP client, or filesystem I/O.
//! Providers are reached only through the [`embedding::EmbeddingProvider`]
//! and [`rag::CompletionProvider`] traits; concrete implementations live in
//! the `mindforge` app crate.

pub mod embedding;
pub mod index;
pub mod models;
pub mod rag;
pub mod segment;
pub mod study;
