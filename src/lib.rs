//! # Pawlog
//!
//! Weekly summaries and retrieval-augmented answers over a dog's daily
//! logs.
//!
//! Raw logs (meals, walks, sleep, toilet, play, barking, free notes) are
//! rolled up into Monday-aligned weekly summaries and text timelines.
//! Those weeks, and a folder of general care advice, are chunked and
//! embedded into two corpora in SQLite. Questions are answered from both:
//! the dog's own recent history and the general advice.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Raw logs  │──▶│ Weekly rollup │──▶│   SQLite    │
//! │ (import)   │   │ summary+texts │   │ logs, weeks │
//! └────────────┘   └──────────────┘   │ chunks+vecs │
//! ┌────────────┐   ┌──────────────┐   │             │
//! │ Advice dir │──▶│ Chunk+Embed  │──▶│             │
//! └────────────┘   └──────────────┘   └──────┬──────┘
//!                                            │
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!                 ┌──────────┐         ┌──────────┐
//!                 │   CLI    │         │   HTTP   │
//!                 │ (pawlog) │         │  (axum)  │
//!                 └──────────┘         └──────────┘
//! ```
//!
//! The algorithms live in `pawlog-core`; this crate supplies SQLite
//! storage, HTTP embedding and chat backends, and the CLI and server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite implementation of the store traits |
//! | [`embedding`] | Embedding backends and `create_provider` |
//! | [`answer`] | Chat-completions answer generator |
//! | [`advice`] | Advice folder scanning, text extraction, indexing |
//! | [`subjects`] | Subject commands and log import |
//! | [`weekly`] | Rebuild and summary commands, date ranges |
//! | [`index_cmd`] | Index commands |
//! | [`search`] | Search and ask commands |
//! | [`stats`] | Database statistics |
//! | [`progress`] | Progress reporting on stderr |
//! | [`server`] | HTTP API |

pub mod advice;
pub mod answer;
pub mod config;
pub mod db;
pub mod embedding;
pub mod index_cmd;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod subjects;
pub mod weekly;
