//! # Pawlog Core
//!
//! Runtime-agnostic logic for Pawlog: log models, weekly windows,
//! aggregation and narrative text, timeline extraction, chunking, store
//! traits, dual-corpus search, and the embedding and answer traits.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Concurrency is expressed with `futures` combinators so any executor
//! can drive it; the `pawlog` app crate supplies SQLite storage and the
//! network-backed providers.
//!
//! ## Pipeline
//!
//! ```text
//! LogRepository ─▶ aggregate + timeline ─▶ SummaryStore
//!                                             │
//!                                             ▼
//!                 DocumentIndexer ─▶ chunk ─▶ EmbeddingProvider ─▶ IndexStore
//!
//! question ─▶ EmbeddingProvider ─▶ search (internal ∥ external) ─▶ compose ─▶ AnswerGenerator
//! ```

pub mod aggregate;
pub mod answer;
pub mod chunk;
pub mod compose;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod models;
pub mod narrative;
pub mod rebuild;
pub mod search;
pub mod store;
pub mod timeline;
pub mod window;
