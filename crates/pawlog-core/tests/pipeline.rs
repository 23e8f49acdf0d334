//! End-to-end pipeline tests over the in-memory store and the hashing
//! embedder: logs in, weekly rebuild, reindex, dual search, ask.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pawlog_core::answer::ask;
use pawlog_core::chunk::ChunkOptions;
use pawlog_core::embedding::HashingProvider;
use pawlog_core::error::{classify, Error};
use pawlog_core::indexer::DocumentIndexer;
use pawlog_core::models::*;
use pawlog_core::rebuild::rebuild_range;
use pawlog_core::search::{search_both, SearchLimits};
use pawlog_core::store::memory::InMemoryStore;
use pawlog_core::store::SummaryStore;
use pawlog_core::window::WeekWindow;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn meta(subject_id: SubjectId, ts: DateTime<Utc>) -> LogMeta {
    LogMeta {
        id: 0,
        subject_id,
        event_at: Some(ts),
        created_at: ts,
    }
}

fn seed(store: &InMemoryStore) -> (Subject, Subject) {
    let bori = store.add_subject("Bori").unwrap();
    let coco = store.add_subject("Coco").unwrap();

    store
        .insert_log(LogEntry::Feeding(Feeding {
            meta: meta(bori.id, at(5, 8)),
            meal_slot: MealSlot::Breakfast,
            grams: Some(200.0),
            completion: Some(Completion::All),
            comment: Some("Finished the whole bowl of kibble".into()),
        }))
        .unwrap();
    store
        .insert_log(LogEntry::Vocalization(Vocalization {
            meta: meta(bori.id, at(6, 23)),
            period: Some(DayPeriod::Night),
            before: Some("Barked at the delivery truck".into()),
            after: None,
            difficulty: 3,
        }))
        .unwrap();
    store
        .insert_log(LogEntry::Walk(Walk {
            meta: meta(coco.id, at(5, 9)),
            minutes: 45,
            distance_km: Some(3.2),
            weather: None,
            comment: Some("Coco chased a kibble truck".into()),
        }))
        .unwrap();

    (bori, coco)
}

fn indexer(store: Arc<InMemoryStore>) -> DocumentIndexer {
    DocumentIndexer::new(store, Arc::new(HashingProvider::new(256)), ChunkOptions::default())
}

#[tokio::test]
async fn weekly_summary_end_to_end() {
    let store = InMemoryStore::new();
    let (bori, _) = seed(&store);

    let report = rebuild_range(&store, &store, bori.id, date(4), date(10))
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.succeeded.len(), 1);

    let summary = &report.succeeded[0].summary;
    assert_eq!(summary.metrics.avg_food_grams, Some(29.0));
    assert_eq!(summary.metrics.bark_night_count, 1);
    assert_eq!(summary.metrics.toilet_fail_rate, None);
    assert!(summary
        .summary_text
        .contains("There were 1 instances of nighttime barking"));
    assert!(!summary.summary_text.contains("【Toilet】"));
    assert!(!summary.summary_text.contains("【Sleep】"));
}

#[tokio::test]
async fn reindex_after_rebuild_is_searchable_per_subject() {
    let store = Arc::new(InMemoryStore::new());
    let (bori, coco) = seed(&store);
    rebuild_range(store.as_ref(), store.as_ref(), bori.id, date(4), date(10))
        .await
        .unwrap();
    rebuild_range(store.as_ref(), store.as_ref(), coco.id, date(4), date(10))
        .await
        .unwrap();

    let idx = indexer(store.clone());
    for subject in [bori.id, coco.id] {
        let report = idx
            .index_range(store.as_ref(), store.as_ref(), subject, date(4), date(10))
            .await
            .unwrap();
        assert!(report.is_complete());
    }
    let advice = DocumentSpec::external_advice("feeding.md", "feeding", Some("feeding"));
    idx.index(&advice, "Measure kibble portions by weight.")
        .await
        .unwrap();

    let provider = HashingProvider::new(256);
    let results = search_both(store.as_ref(), &provider, "kibble", bori.id, SearchLimits::default())
        .await
        .unwrap();
    assert!(!results.internal.is_empty());
    for hit in &results.internal {
        assert_eq!(hit.metadata["subjectId"], bori.id);
        assert!(!hit.content.contains("Coco"));
    }
    assert_eq!(results.external.len(), 1);
    assert_eq!(results.external[0].metadata["topic"], "feeding");
}

#[tokio::test]
async fn rebuild_and_reindex_twice_is_stable() {
    let store = Arc::new(InMemoryStore::new());
    let (bori, _) = seed(&store);
    let idx = indexer(store.clone());

    let mut chunk_counts = Vec::new();
    for _ in 0..2 {
        rebuild_range(store.as_ref(), store.as_ref(), bori.id, date(4), date(10))
            .await
            .unwrap();
        idx.index_range(store.as_ref(), store.as_ref(), bori.id, date(4), date(10))
            .await
            .unwrap();
        chunk_counts.push(store.chunk_count().unwrap());
    }
    assert_eq!(chunk_counts[0], chunk_counts[1]);

    let window = WeekWindow::containing(bori.id, date(4));
    assert_eq!(store.timeline(&window).await.unwrap().len(), 2);
}

#[tokio::test]
async fn ask_degrades_without_generator() {
    let store = Arc::new(InMemoryStore::new());
    let (bori, _) = seed(&store);
    rebuild_range(store.as_ref(), store.as_ref(), bori.id, date(4), date(10))
        .await
        .unwrap();
    indexer(store.clone())
        .index_range(store.as_ref(), store.as_ref(), bori.id, date(4), date(10))
        .await
        .unwrap();

    let outcome = ask(
        store.as_ref(),
        &HashingProvider::new(256),
        None,
        &bori,
        "Why does Bori bark at night?",
        SearchLimits::default(),
    )
    .await
    .unwrap();
    assert!(outcome.degraded);
    assert!(outcome.answer.contains("[Internal Context 1]"));
    assert!(outcome.answer.contains("No relevant external advice found."));
}

#[tokio::test]
async fn ask_fails_when_provider_width_changed_after_indexing() {
    let store = Arc::new(InMemoryStore::new());
    let (bori, _) = seed(&store);
    rebuild_range(store.as_ref(), store.as_ref(), bori.id, date(4), date(10))
        .await
        .unwrap();
    indexer(store.clone())
        .index_range(store.as_ref(), store.as_ref(), bori.id, date(4), date(10))
        .await
        .unwrap();

    let err = ask(
        store.as_ref(),
        &HashingProvider::new(128),
        None,
        &bori,
        "Is Bori eating enough?",
        SearchLimits::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(classify(&err), Some(Error::Configuration(_))));
}
