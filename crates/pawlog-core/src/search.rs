//! Dual-corpus vector search.
//!
//! A query is embedded once and run against both partitions of the index
//! concurrently: the subject's own history (internal) and the shared
//! advice corpus (external). A failure on one side is logged and yields an
//! empty list for that side; the other side's results are still returned.
//!
//! The provider's width is checked against the index before the query is
//! embedded, so a provider swapped after indexing fails with a
//! configuration error instead of ranking against incompatible vectors.

use anyhow::Result;
use serde::Serialize;

use crate::embedding::{embed_query, ensure_dimension, EmbeddingProvider};
use crate::error::Error;
use crate::models::SubjectId;
use crate::store::{CorpusFilter, IndexStore, ScoredChunk};

#[derive(Debug, Clone, Default, Serialize)]
pub struct DualResults {
    pub internal: Vec<ScoredChunk>,
    pub external: Vec<ScoredChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub top_k_internal: usize,
    pub top_k_external: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            top_k_internal: 5,
            top_k_external: 5,
        }
    }
}

pub async fn search_both(
    store: &dyn IndexStore,
    provider: &dyn EmbeddingProvider,
    query: &str,
    subject_id: SubjectId,
    limits: SearchLimits,
) -> Result<DualResults> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::validation("query must not be empty"));
    }

    ensure_dimension(provider, store.vector_dims().await?)?;
    let vector = embed_query(provider, query).await?;
    let internal_filter = CorpusFilter::Internal { subject_id };
    let (internal, external) = futures::join!(
        store.search(&vector, &internal_filter, limits.top_k_internal),
        store.search(&vector, &CorpusFilter::External, limits.top_k_external),
    );

    Ok(DualResults {
        internal: or_empty(internal, "internal"),
        external: or_empty(external, "external"),
    })
}

fn or_empty(result: Result<Vec<ScoredChunk>>, side: &str) -> Vec<ScoredChunk> {
    result.unwrap_or_else(|err| {
        tracing::warn!(corpus = side, error = %err, "search failed, continuing without it");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::chunk::ChunkOptions;
    use crate::embedding::HashingProvider;
    use crate::error::classify;
    use crate::indexer::DocumentIndexer;
    use crate::models::{DocumentSpec, Subject};
    use crate::store::memory::InMemoryStore;
    use crate::store::NewChunk;
    use crate::window::WeekWindow;
    use chrono::NaiveDate;

    async fn seeded() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let idx = DocumentIndexer::new(
            store.clone(),
            Arc::new(HashingProvider::new(128)),
            ChunkOptions::default(),
        );
        let window = WeekWindow::containing(1, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        let bori = Subject { id: 1, name: "Bori".into() };
        let coco = Subject { id: 2, name: "Coco".into() };
        idx.index(
            &DocumentSpec::weekly_summary(&bori, &window),
            "Bori barked at night three times",
        )
        .await
        .unwrap();
        idx.index(
            &DocumentSpec::weekly_summary(&coco, &window),
            "Coco barked at night every night",
        )
        .await
        .unwrap();
        idx.index(
            &DocumentSpec::external_advice("behavior.md", "behavior", Some("behavior")),
            "Night barking often means boredom",
        )
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn results_are_partitioned_by_corpus_and_subject() {
        let store = seeded().await;
        let provider = HashingProvider::new(128);
        let results = search_both(
            store.as_ref(),
            &provider,
            "barked at night",
            1,
            SearchLimits::default(),
        )
        .await
        .unwrap();

        assert_eq!(results.internal.len(), 1);
        assert!(results.internal[0].content.starts_with("Bori"));
        assert_eq!(results.external.len(), 1);
        assert_eq!(results.external[0].metadata["corpus"], "external");
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let store = InMemoryStore::new();
        let err = search_both(&store, &HashingProvider::new(8), "  ", 1, SearchLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), Some(Error::Validation(_))));
    }

    #[tokio::test]
    async fn provider_width_must_match_index() {
        let store = Arc::new(InMemoryStore::new());
        let idx = DocumentIndexer::new(
            store.clone(),
            Arc::new(HashingProvider::new(64)),
            ChunkOptions::default(),
        );
        idx.prepare().await.unwrap();
        idx.index(
            &DocumentSpec::external_advice("feeding.md", "feeding", Some("feeding")),
            "Feed raw bones daily.",
        )
        .await
        .unwrap();

        let err = search_both(
            store.as_ref(),
            &HashingProvider::new(32),
            "raw bones",
            1,
            SearchLimits::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(classify(&err), Some(Error::Configuration(_))));

        let ok = search_both(
            store.as_ref(),
            &HashingProvider::new(64),
            "raw bones",
            1,
            SearchLimits::default(),
        )
        .await
        .unwrap();
        assert_eq!(ok.external.len(), 1);
    }

    struct ExternalDown(InMemoryStore);

    #[async_trait]
    impl IndexStore for ExternalDown {
        async fn upsert_document(&self, doc: &DocumentSpec) -> Result<String> {
            self.0.upsert_document(doc).await
        }
        async fn document_id(&self, key: &str) -> Result<Option<String>> {
            self.0.document_id(key).await
        }
        async fn delete_chunks(&self, id: &str) -> Result<u64> {
            self.0.delete_chunks(id).await
        }
        async fn replace_chunks(&self, id: &str, doc: &DocumentSpec, c: &[NewChunk]) -> Result<()> {
            self.0.replace_chunks(id, doc, c).await
        }
        async fn search(
            &self,
            v: &[f32],
            filter: &CorpusFilter,
            top_k: usize,
        ) -> Result<Vec<ScoredChunk>> {
            match filter {
                CorpusFilter::External => anyhow::bail!("external partition unavailable"),
                _ => self.0.search(v, filter, top_k).await,
            }
        }
        async fn vector_dims(&self) -> Result<Option<usize>> {
            self.0.vector_dims().await
        }
        async fn declare_vector_dims(&self, dims: usize) -> Result<()> {
            self.0.declare_vector_dims(dims).await
        }
    }

    #[tokio::test]
    async fn one_side_failing_keeps_the_other() {
        let store = ExternalDown(InMemoryStore::new());
        let bori = Subject { id: 1, name: "Bori".into() };
        let window = WeekWindow::containing(1, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        let doc = DocumentSpec::weekly_summary(&bori, &window);
        let id = store.upsert_document(&doc).await.unwrap();
        let provider = HashingProvider::new(16);
        store
            .replace_chunks(
                &id,
                &doc,
                &[NewChunk {
                    chunk_index: 0,
                    content: "walked 30 minutes".into(),
                    embedding: provider.embed_one("walked 30 minutes"),
                    metadata: Default::default(),
                }],
            )
            .await
            .unwrap();

        let results = search_both(&store, &provider, "walked", 1, SearchLimits::default())
            .await
            .unwrap();
        assert_eq!(results.internal.len(), 1);
        assert!(results.external.is_empty());
    }
}
