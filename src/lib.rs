//! # MindForge
//!
//! A local-first study assistant. Units (study projects) collect uploaded
//! documents and video transcripts; each analysis produces a summary, a
//! concept map, and an embedding index that backs retrieval-augmented chat.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ extract /    │──▶│ segment +    │──▶│ <unit>/        │
//! │ transcript   │   │ embed index  │   │ vector_index/  │
//! └──────────────┘   └──────┬───────┘   └───────┬────────┘
//!                           │                   │
//!                           ▼                   ▼
//!                    ┌────────────┐      ┌─────────────┐
//!                    │ summary /  │      │ Responder   │
//!                    │ map / quiz │      │ (RAG chat)  │
//!                    └────────────┘      └─────────────┘
//! ```
//!
//! Algorithms live in the `mindforge-core` crate; this crate adds the
//! HTTP providers, persistence, sessions, and the `mindforge` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credential checks |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`completion`] | OpenAI-compatible completion provider |
//! | [`http`] | Retry and backoff for provider calls |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`transcript`] | Video URLs and caption files |
//! | [`units`] | Unit registry, notes, chat, analysis files |
//! | [`index_store`] | Saving and loading embedding indexes |
//! | [`session`] | Open-unit state and the analyze / ask operations |
//! | [`fsutil`] | Atomic writes and retrying directory removal |

pub mod chat;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod fsutil;
pub mod http;
pub mod index_store;
pub mod ingest;
pub mod search;
pub mod session;
pub mod study_cmd;
pub mod transcript;
pub mod unit_cmd;
pub mod units;
