//! In-memory store for tests and embedded use.
//!
//! Implements [`LogRepository`], [`SummaryStore`], and [`IndexStore`]
//! with `Vec`s and `HashMap`s behind `std::sync::RwLock`. Vector search
//! is brute-force cosine similarity over every chunk in the requested
//! corpus.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::models::{
    Corpus, DocumentSpec, Elimination, Feeding, FreeNote, LogEntry, LogMeta, Play, Sleep,
    Subject, SubjectId, TimelineEntry, Vocalization, Walk, WeekLogs, WeeklySummary,
};
use crate::window::WeekWindow;

use super::{CorpusFilter, IndexStore, LogRepository, NewChunk, ScoredChunk, SummaryStore};

struct StoredChunk {
    document_id: String,
    corpus: Corpus,
    subject_id: Option<SubjectId>,
    chunk: NewChunk,
}

#[derive(Default)]
struct Inner {
    subjects: Vec<Subject>,
    logs: WeekLogs,
    next_log_id: i64,
    summaries: HashMap<WeekWindow, WeeklySummary>,
    timelines: HashMap<WeekWindow, Vec<TimelineEntry>>,
    /// source key -> document ID
    docs: HashMap<String, String>,
    chunks: Vec<StoredChunk>,
    vector_dims: Option<usize>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    pub fn add_subject(&self, name: &str) -> Result<Subject> {
        let mut inner = self.write()?;
        let subject = Subject {
            id: inner.subjects.len() as SubjectId + 1,
            name: name.to_string(),
        };
        inner.subjects.push(subject.clone());
        Ok(subject)
    }

    /// Store a raw log, assigning an ID when it has none. Returns the ID.
    pub fn insert_log(&self, mut entry: LogEntry) -> Result<i64> {
        let mut inner = self.write()?;
        if entry.meta().id == 0 {
            inner.next_log_id += 1;
            entry.meta_mut().id = inner.next_log_id;
        }
        let id = entry.meta().id;
        inner.logs.push(entry);
        Ok(id)
    }

    /// Number of chunks currently stored, across all documents.
    pub fn chunk_count(&self) -> Result<usize> {
        Ok(self.read()?.chunks.len())
    }
}

fn in_range<'a, T: 'a>(
    items: &'a [T],
    meta: impl Fn(&T) -> &LogMeta + 'a,
    subject_id: SubjectId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> impl Iterator<Item = &'a T> + 'a {
    items.iter().filter(move |item| {
        let m = meta(item);
        let ts = m.effective_at();
        m.subject_id == subject_id && ts >= from && ts <= to
    })
}

macro_rules! fetch_stream {
    ($self:ident, $field:ident, $subject:ident, $from:ident, $to:ident) => {{
        let inner = $self.read()?;
        let found = in_range(&inner.logs.$field, |e| &e.meta, $subject, $from, $to)
            .cloned()
            .collect();
        Ok(found)
    }};
}

#[async_trait]
impl LogRepository for InMemoryStore {
    async fn subject(&self, id: SubjectId) -> Result<Option<Subject>> {
        Ok(self.read()?.subjects.iter().find(|s| s.id == id).cloned())
    }

    async fn eliminations(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Elimination>> {
        fetch_stream!(self, eliminations, subject_id, from, to)
    }

    async fn feedings(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Feeding>> {
        fetch_stream!(self, feedings, subject_id, from, to)
    }

    async fn sleeps(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sleep>> {
        fetch_stream!(self, sleeps, subject_id, from, to)
    }

    async fn walks(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Walk>> {
        fetch_stream!(self, walks, subject_id, from, to)
    }

    async fn plays(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Play>> {
        fetch_stream!(self, plays, subject_id, from, to)
    }

    async fn vocalizations(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Vocalization>> {
        fetch_stream!(self, vocalizations, subject_id, from, to)
    }

    async fn notes(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FreeNote>> {
        fetch_stream!(self, notes, subject_id, from, to)
    }
}

#[async_trait]
impl SummaryStore for InMemoryStore {
    async fn upsert_summary(&self, summary: &WeeklySummary) -> Result<()> {
        self.write()?
            .summaries
            .insert(summary.window, summary.clone());
        Ok(())
    }

    async fn summary(&self, window: &WeekWindow) -> Result<Option<WeeklySummary>> {
        Ok(self.read()?.summaries.get(window).cloned())
    }

    async fn summaries_in_range(
        &self,
        subject_id: SubjectId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeeklySummary>> {
        let inner = self.read()?;
        let mut found: Vec<WeeklySummary> = inner
            .summaries
            .values()
            .filter(|s| {
                s.window.subject_id == subject_id && s.window.end >= start && s.window.start <= end
            })
            .cloned()
            .collect();
        found.sort_by_key(|s| s.window.start);
        Ok(found)
    }

    async fn replace_timeline(&self, window: &WeekWindow, entries: &[TimelineEntry]) -> Result<()> {
        self.write()?.timelines.insert(*window, entries.to_vec());
        Ok(())
    }

    async fn timeline(&self, window: &WeekWindow) -> Result<Vec<TimelineEntry>> {
        Ok(self
            .read()?
            .timelines
            .get(window)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl IndexStore for InMemoryStore {
    async fn upsert_document(&self, doc: &DocumentSpec) -> Result<String> {
        let mut inner = self.write()?;
        let id = inner
            .docs
            .entry(doc.source_key.clone())
            .or_insert_with(|| Uuid::new_v4().to_string());
        Ok(id.clone())
    }

    async fn document_id(&self, source_key: &str) -> Result<Option<String>> {
        Ok(self.read()?.docs.get(source_key).cloned())
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.chunks.len();
        inner.chunks.retain(|c| c.document_id != document_id);
        Ok((before - inner.chunks.len()) as u64)
    }

    async fn replace_chunks(
        &self,
        document_id: &str,
        doc: &DocumentSpec,
        chunks: &[NewChunk],
    ) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.docs.values().any(|id| id == document_id) {
            bail!("document {} does not exist", document_id);
        }
        inner.chunks.retain(|c| c.document_id != document_id);
        for chunk in chunks {
            inner.chunks.push(StoredChunk {
                document_id: document_id.to_string(),
                corpus: doc.corpus(),
                subject_id: doc.subject_id,
                chunk: chunk.clone(),
            });
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        filter: &CorpusFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let inner = self.read()?;
        let mut hits: Vec<ScoredChunk> = inner
            .chunks
            .iter()
            .filter(|c| c.corpus == filter.corpus())
            .filter(|c| match filter {
                CorpusFilter::Internal { subject_id } => c.subject_id == Some(*subject_id),
                CorpusFilter::External => true,
            })
            .map(|c| ScoredChunk {
                document_id: c.document_id.clone(),
                content: c.chunk.content.clone(),
                metadata: serde_json::Value::Object(c.chunk.metadata.clone()),
                score: cosine_similarity(query_vec, &c.chunk.embedding) as f64,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn vector_dims(&self) -> Result<Option<usize>> {
        Ok(self.read()?.vector_dims)
    }

    async fn declare_vector_dims(&self, dims: usize) -> Result<()> {
        let mut inner = self.write()?;
        match inner.vector_dims {
            Some(existing) if existing != dims => Err(crate::error::Error::configuration(format!(
                "index is declared with {}-dimensional vectors, not {}",
                existing, dims
            ))),
            _ => {
                inner.vector_dims = Some(dims);
                Ok(())
            }
        }
    }
}
