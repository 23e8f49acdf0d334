//! Storage abstraction for Pawlog.
//!
//! Three traits split storage by concern so callers only depend on what
//! they use:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`LogRepository`] | Read raw logs per stream for a time range |
//! | [`SummaryStore`] | Persist weekly summaries and timelines |
//! | [`IndexStore`] | Persist documents and chunks; serve vector search |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! [`memory::InMemoryStore`] implements all three for tests; the SQLite
//! implementation lives in the `pawlog` app crate.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{
    Corpus, DocumentSpec, Elimination, Feeding, FreeNote, Play, Sleep, Subject, SubjectId,
    TimelineEntry, Vocalization, Walk, WeeklySummary,
};
use crate::window::WeekWindow;

/// Read-only access to raw logs.
///
/// Every fetch returns records whose effective timestamp (event time,
/// else creation time) lies in `[from, to]`, both ends inclusive.
#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn subject(&self, id: SubjectId) -> Result<Option<Subject>>;

    async fn eliminations(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Elimination>>;
    async fn feedings(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Feeding>>;
    async fn sleeps(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sleep>>;
    async fn walks(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Walk>>;
    async fn plays(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Play>>;
    async fn vocalizations(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Vocalization>>;
    async fn notes(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FreeNote>>;
}

/// Derived weekly records. Both writes are full replacements.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Insert or replace the summary keyed by `(subject, start, end)`.
    async fn upsert_summary(&self, summary: &WeeklySummary) -> Result<()>;

    async fn summary(&self, window: &WeekWindow) -> Result<Option<WeeklySummary>>;

    /// Stored summaries whose window overlaps `[start, end]`, oldest first.
    async fn summaries_in_range(
        &self,
        subject_id: SubjectId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeeklySummary>>;

    /// Delete the window's timeline and insert `entries`, atomically.
    async fn replace_timeline(&self, window: &WeekWindow, entries: &[TimelineEntry]) -> Result<()>;

    async fn timeline(&self, window: &WeekWindow) -> Result<Vec<TimelineEntry>>;
}

/// A chunk to be written, with its vector.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// Which partition a vector search runs against.
///
/// Internal searches always carry a subject: there is no way to search
/// internal history across subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFilter {
    Internal { subject_id: SubjectId },
    External,
}

impl CorpusFilter {
    pub fn corpus(&self) -> Corpus {
        match self {
            CorpusFilter::Internal { .. } => Corpus::Internal,
            CorpusFilter::External => Corpus::External,
        }
    }

    pub fn subject_id(&self) -> Option<SubjectId> {
        match self {
            CorpusFilter::Internal { subject_id } => Some(*subject_id),
            CorpusFilter::External => None,
        }
    }
}

/// A search hit. `score` is cosine similarity (`1 − cosine distance`).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub document_id: String,
    pub content: String,
    pub metadata: Value,
    pub score: f64,
}

/// Documents, chunks, and vector search.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Resolve the document by source key, creating it if absent.
    /// Returns the document ID.
    async fn upsert_document(&self, doc: &DocumentSpec) -> Result<String>;

    async fn document_id(&self, source_key: &str) -> Result<Option<String>>;

    /// Delete every chunk owned by a document. Returns the number removed.
    async fn delete_chunks(&self, document_id: &str) -> Result<u64>;

    /// Delete the document's chunks and insert `chunks`, atomically.
    /// Corpus and subject columns are taken from `doc`.
    async fn replace_chunks(
        &self,
        document_id: &str,
        doc: &DocumentSpec,
        chunks: &[NewChunk],
    ) -> Result<()>;

    /// Top-`top_k` chunks by cosine similarity within `filter`, best first.
    async fn search(
        &self,
        query_vec: &[f32],
        filter: &CorpusFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// The vector width the index was declared with, if any.
    async fn vector_dims(&self) -> Result<Option<usize>>;

    /// Declare the vector width. Fails if a different width is already set.
    async fn declare_vector_dims(&self, dims: usize) -> Result<()>;
}
