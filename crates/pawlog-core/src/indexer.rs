//! Document indexer: chunk, embed, replace.
//!
//! Indexing a document resolves it by source key (creating it if new),
//! chunks the text, embeds every chunk in one provider call, and swaps the
//! document's chunk set in a single store transaction. Re-indexing the
//! same source key therefore never leaves stale chunks behind.
//!
//! Two index calls for the same source key are serialized; calls for
//! different keys run concurrently.
//!
//! Blank text yields zero chunks. A document that was indexed before loses
//! its previous chunks; an unknown one is not created.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use futures::future::join_all;

use crate::chunk::{chunk_with_metadata, ChunkOptions};
use crate::embedding::{embed_batch, ensure_dimension, EmbeddingProvider};
use crate::models::{DocumentSpec, Subject, SubjectId};
use crate::rebuild::{require_subject, RangeReport, WeekFailure};
use crate::store::{IndexStore, LogRepository, NewChunk, SummaryStore};
use crate::timeline::render_document;
use crate::window::{week_windows, WeekWindow};

type KeyLock = Arc<futures::lock::Mutex<()>>;

pub struct DocumentIndexer {
    store: Arc<dyn IndexStore>,
    provider: Arc<dyn EmbeddingProvider>,
    options: ChunkOptions,
    locks: Mutex<HashMap<String, KeyLock>>,
}

/// Result of indexing one document. `document_id` is `None` when the text
/// was blank and the source key had never been indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    pub source_key: String,
    pub document_id: Option<String>,
    pub chunks: usize,
}

/// Both internal documents for one window.
#[derive(Debug, Clone)]
pub struct WeekIndexOutcome {
    pub window: WeekWindow,
    pub summary: IndexOutcome,
    pub timeline: IndexOutcome,
}

impl DocumentIndexer {
    pub fn new(
        store: Arc<dyn IndexStore>,
        provider: Arc<dyn EmbeddingProvider>,
        options: ChunkOptions,
    ) -> Self {
        Self {
            store,
            provider,
            options,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Check the provider against the store's vector width, declaring the
    /// width on first use.
    pub async fn prepare(&self) -> Result<()> {
        let declared = self.store.vector_dims().await?;
        ensure_dimension(self.provider.as_ref(), declared)?;
        if declared.is_none() {
            self.store.declare_vector_dims(self.provider.dims()).await?;
        }
        Ok(())
    }

    fn key_lock(&self, source_key: &str) -> Result<KeyLock> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| anyhow!("indexer lock table poisoned"))?;
        Ok(locks
            .entry(source_key.to_string())
            .or_insert_with(|| Arc::new(futures::lock::Mutex::new(())))
            .clone())
    }

    /// Drop the key's lock once no other call holds it.
    fn release_key(&self, source_key: &str, lock: KeyLock) {
        drop(lock);
        if let Ok(mut locks) = self.locks.lock() {
            if locks
                .get(source_key)
                .is_some_and(|l| Arc::strong_count(l) == 1)
            {
                locks.remove(source_key);
            }
        }
    }

    pub async fn index(&self, doc: &DocumentSpec, text: &str) -> Result<IndexOutcome> {
        let lock = self.key_lock(&doc.source_key)?;
        let result = {
            let _guard = lock.lock().await;
            self.index_locked(doc, text).await
        };
        self.release_key(&doc.source_key, lock);
        result
    }

    async fn index_locked(&self, doc: &DocumentSpec, text: &str) -> Result<IndexOutcome> {
        if text.trim().is_empty() {
            let document_id = self.store.document_id(&doc.source_key).await?;
            if let Some(id) = &document_id {
                self.store.replace_chunks(id, doc, &[]).await?;
                tracing::debug!(source_key = %doc.source_key, "cleared document with blank text");
            }
            return Ok(IndexOutcome {
                source_key: doc.source_key.clone(),
                document_id,
                chunks: 0,
            });
        }

        let drafts = chunk_with_metadata(text, &self.options, &doc.metadata);
        let texts: Vec<String> = drafts.iter().map(|d| d.content.clone()).collect();
        let vectors = embed_batch(self.provider.as_ref(), &texts).await?;

        let document_id = self.store.upsert_document(doc).await?;
        let chunks: Vec<NewChunk> = drafts
            .into_iter()
            .zip(vectors)
            .map(|(draft, embedding)| NewChunk {
                chunk_index: draft.chunk_index,
                content: draft.content,
                embedding,
                metadata: draft.metadata,
            })
            .collect();
        self.store.replace_chunks(&document_id, doc, &chunks).await?;

        tracing::debug!(
            source_key = %doc.source_key,
            chunks = chunks.len(),
            "indexed document"
        );

        Ok(IndexOutcome {
            source_key: doc.source_key.clone(),
            document_id: Some(document_id),
            chunks: chunks.len(),
        })
    }

    /// Index the stored summary and timeline of one window.
    ///
    /// The summary document is `Dog / Period / narrative`; the timeline
    /// document is the rendered timeline. A window with no stored summary
    /// yields empty text and is skipped.
    pub async fn index_week(
        &self,
        summaries: &dyn SummaryStore,
        subject: &Subject,
        window: &WeekWindow,
    ) -> Result<WeekIndexOutcome> {
        let (summary, timeline) =
            futures::try_join!(summaries.summary(window), summaries.timeline(window))?;

        let summary_text = summary
            .map(|s| summary_document(&subject.name, window, &s.summary_text))
            .unwrap_or_default();
        let timeline_text = render_document(&subject.name, window, &timeline);

        let summary_doc = DocumentSpec::weekly_summary(subject, window);
        let timeline_doc = DocumentSpec::week_timeline(subject, window);
        let (summary, timeline) = futures::try_join!(
            self.index(&summary_doc, &summary_text),
            self.index(&timeline_doc, &timeline_text),
        )?;

        Ok(WeekIndexOutcome {
            window: *window,
            summary,
            timeline,
        })
    }

    /// Index every window overlapping `[start, end]` for a subject.
    pub async fn index_range(
        &self,
        repo: &dyn LogRepository,
        summaries: &dyn SummaryStore,
        subject_id: SubjectId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeReport<WeekIndexOutcome>> {
        let subject = require_subject(repo, subject_id).await?;
        let windows = week_windows(subject_id, start, end)?;
        self.prepare().await?;

        let results = join_all(
            windows
                .iter()
                .map(|w| self.index_week(summaries, &subject, w)),
        )
        .await;

        let mut report = RangeReport {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for (window, result) in windows.into_iter().zip(results) {
            match result {
                Ok(outcome) => report.succeeded.push(outcome),
                Err(error) => {
                    tracing::warn!(
                        subject = subject_id,
                        week = %window.label(),
                        error = %error,
                        "weekly indexing failed"
                    );
                    report.failed.push(WeekFailure { window, error });
                }
            }
        }
        Ok(report)
    }
}

/// Text of the weekly summary document.
pub fn summary_document(subject_name: &str, window: &WeekWindow, summary_text: &str) -> String {
    format!(
        "Dog: {}\nPeriod: {} ~ {}\n{}",
        subject_name, window.start, window.end, summary_text
    )
}
