//! Weekly rebuild: fetch, aggregate, persist.
//!
//! A rebuild of one window reads all seven log streams concurrently,
//! computes the [`WeeklySummary`](crate::models::WeeklySummary) and the
//! text timeline, and writes both as full replacements. Running it twice
//! over unchanged logs leaves the stored state identical.
//!
//! [`rebuild_range`] rebuilds every window overlapping a date range. One
//! window failing does not stop the others; failures are collected in the
//! [`RangeReport`].

use anyhow::Result;
use chrono::NaiveDate;
use futures::future::join_all;

use crate::aggregate::summarize;
use crate::error::Error;
use crate::models::{Subject, SubjectId, TimelineEntry, WeekLogs, WeeklySummary};
use crate::store::{LogRepository, SummaryStore};
use crate::timeline::build_timeline;
use crate::window::{week_windows, WeekWindow};

/// Fetch every stream for one window concurrently.
pub async fn fetch_week_logs(repo: &dyn LogRepository, window: &WeekWindow) -> Result<WeekLogs> {
    let (from, to, id) = (window.start_at(), window.end_at(), window.subject_id);
    let (eliminations, feedings, sleeps, walks, plays, vocalizations, notes) = futures::try_join!(
        repo.eliminations(id, from, to),
        repo.feedings(id, from, to),
        repo.sleeps(id, from, to),
        repo.walks(id, from, to),
        repo.plays(id, from, to),
        repo.vocalizations(id, from, to),
        repo.notes(id, from, to),
    )?;

    Ok(WeekLogs {
        eliminations,
        feedings,
        sleeps,
        walks,
        plays,
        vocalizations,
        notes,
    })
}

/// Output of one window rebuild.
#[derive(Debug, Clone)]
pub struct WeekRebuild {
    pub summary: WeeklySummary,
    pub timeline: Vec<TimelineEntry>,
    pub log_count: usize,
}

pub async fn rebuild_week(
    repo: &dyn LogRepository,
    summaries: &dyn SummaryStore,
    subject: &Subject,
    window: &WeekWindow,
) -> Result<WeekRebuild> {
    let logs = fetch_week_logs(repo, window).await?;
    let summary = summarize(subject, window, &logs);
    let timeline = build_timeline(&logs);

    futures::try_join!(
        summaries.upsert_summary(&summary),
        summaries.replace_timeline(window, &timeline),
    )?;

    tracing::debug!(
        subject = subject.id,
        week = %window.label(),
        logs = logs.len(),
        timeline = timeline.len(),
        "rebuilt week"
    );

    Ok(WeekRebuild {
        summary,
        timeline,
        log_count: logs.len(),
    })
}

#[derive(Debug)]
pub struct WeekFailure {
    pub window: WeekWindow,
    pub error: anyhow::Error,
}

/// Per-window outcome of a range operation.
#[derive(Debug, Default)]
pub struct RangeReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<WeekFailure>,
}

impl<T> RangeReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolve a subject or fail with a not-found error.
pub async fn require_subject(repo: &dyn LogRepository, subject_id: SubjectId) -> Result<Subject> {
    repo.subject(subject_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("subject {}", subject_id)))
}

/// Rebuild every week window overlapping `[start, end]`.
///
/// Windows are rebuilt concurrently. The report lists successes in window
/// order; each failure is logged and recorded without aborting the rest.
pub async fn rebuild_range(
    repo: &dyn LogRepository,
    summaries: &dyn SummaryStore,
    subject_id: SubjectId,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RangeReport<WeekRebuild>> {
    let subject = require_subject(repo, subject_id).await?;
    let windows = week_windows(subject_id, start, end)?;

    let results = join_all(
        windows
            .iter()
            .map(|w| rebuild_week(repo, summaries, &subject, w)),
    )
    .await;

    let mut report = RangeReport {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (window, result) in windows.into_iter().zip(results) {
        match result {
            Ok(rebuilt) => report.succeeded.push(rebuilt),
            Err(error) => {
                tracing::warn!(
                    subject = subject_id,
                    week = %window.label(),
                    error = %error,
                    "weekly rebuild failed"
                );
                report.failed.push(WeekFailure { window, error });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::fixtures::{at, feeding};
    use crate::models::LogEntry;
    use crate::store::memory::InMemoryStore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn rebuild_is_idempotent() {
        let store = InMemoryStore::new();
        let bori = store.add_subject("Bori").unwrap();
        let mut f = feeding(0, at(5, 8), Some(140.0));
        f.comment = Some("ate slowly".into());
        store.insert_log(LogEntry::Feeding(f)).unwrap();

        let first = rebuild_range(&store, &store, bori.id, date(4), date(10))
            .await
            .unwrap();
        let second = rebuild_range(&store, &store, bori.id, date(4), date(10))
            .await
            .unwrap();
        assert!(first.is_complete());
        assert_eq!(first.succeeded[0].summary, second.succeeded[0].summary);

        let window = WeekWindow::containing(bori.id, date(4));
        let stored = store.summary(&window).await.unwrap().unwrap();
        assert_eq!(stored.metrics.avg_food_grams, Some(20.0));
        assert_eq!(store.timeline(&window).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn range_covers_every_overlapping_week() {
        let store = InMemoryStore::new();
        let bori = store.add_subject("Bori").unwrap();
        let report = rebuild_range(&store, &store, bori.id, date(6), date(19))
            .await
            .unwrap();
        let starts: Vec<_> = report
            .succeeded
            .iter()
            .map(|r| r.summary.window.start)
            .collect();
        assert_eq!(starts, vec![date(4), date(11), date(18)]);
    }

    #[tokio::test]
    async fn unknown_subject_is_not_found() {
        let store = InMemoryStore::new();
        let err = rebuild_range(&store, &store, 42, date(4), date(10))
            .await
            .unwrap_err();
        assert!(matches!(
            crate::error::classify(&err),
            Some(Error::NotFound(_))
        ));
    }
}
