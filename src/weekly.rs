//! `pawlog rebuild` and `pawlog summary`.

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};

use pawlog_core::error::Error;
use pawlog_core::rebuild::rebuild_range;
use pawlog_core::store::SummaryStore;
use pawlog_core::window::WeekWindow;

use crate::config::Config;
use crate::progress::{Progress, ProgressMode};
use crate::sqlite_store::SqliteStore;
use crate::subjects::resolve_subject;

/// Resolve an inclusive date range.
///
/// `days` wins over explicit dates and means "the last N days including
/// `today`". With only `since`, the range ends today; with only `until`,
/// it starts `default_days - 1` days earlier. With nothing, the last
/// `default_days` days.
pub fn resolve_range(
    days: Option<u32>,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
    default_days: u32,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let lookback = |end: NaiveDate, n: u32| end - Duration::days(i64::from(n.max(1)) - 1);

    let (start, end) = match (days, since, until) {
        (Some(0), _, _) => return Err(Error::validation("days must be a positive number")),
        (Some(n), _, _) => (lookback(today, n), today),
        (None, Some(s), Some(u)) => (s, u),
        (None, Some(s), None) => (s, today),
        (None, None, Some(u)) => (lookback(u, default_days), u),
        (None, None, None) => (lookback(today, default_days), today),
    };

    if start > end {
        return Err(Error::validation(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    Ok((start, end))
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("invalid date '{}', expected YYYY-MM-DD", s)))
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Date range flags shared by `rebuild` and `index internal`.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RangeArgs {
    /// First day (YYYY-MM-DD).
    #[arg(long)]
    pub since: Option<String>,

    /// Last day (YYYY-MM-DD).
    #[arg(long)]
    pub until: Option<String>,

    /// Last N days including today. Takes precedence over --since/--until.
    #[arg(long)]
    pub days: Option<u32>,
}

impl RangeArgs {
    pub fn resolve(&self, config: &Config) -> Result<(NaiveDate, NaiveDate)> {
        let since = self.since.as_deref().map(parse_date).transpose()?;
        let until = self.until.as_deref().map(parse_date).transpose()?;
        resolve_range(
            self.days,
            since,
            until,
            config.retrieval.lookback_days,
            today(),
        )
    }
}

pub async fn run_rebuild(
    config: &Config,
    store: &SqliteStore,
    subject: &str,
    range: &RangeArgs,
    progress: ProgressMode,
) -> Result<()> {
    let subject = resolve_subject(store, subject).await?;
    let (start, end) = range.resolve(config)?;

    let task = format!("rebuild {}", subject.name);
    let weeks = pawlog_core::window::week_windows(subject.id, start, end)?.len() as u64;
    progress.report(Progress {
        task: &task,
        done: 0,
        total: weeks,
    });

    let report = rebuild_range(store, store, subject.id, start, end).await?;
    progress.report(Progress {
        task: &task,
        done: weeks,
        total: weeks,
    });

    println!("rebuild {} ({} ~ {})", subject.name, start, end);
    for week in &report.succeeded {
        println!(
            "  {}  logs: {}  timeline: {}",
            week.summary.window.label(),
            week.log_count,
            week.timeline.len()
        );
    }
    for failure in &report.failed {
        println!("  {}  failed: {}", failure.window.label(), failure.error);
    }
    println!("  weeks rebuilt: {}", report.succeeded.len());
    println!("  weeks failed: {}", report.failed.len());
    if report.is_complete() {
        println!("ok");
    }
    Ok(())
}

pub async fn run_summary(store: &SqliteStore, subject: &str, week: &str) -> Result<()> {
    let subject = resolve_subject(store, subject).await?;
    let window = WeekWindow::containing(subject.id, parse_date(week)?);

    let (summary, timeline) =
        futures::try_join!(store.summary(&window), store.timeline(&window))?;

    let Some(summary) = summary else {
        println!(
            "No summary for {} ({}). Run `pawlog rebuild` first.",
            subject.name,
            window.label()
        );
        return Ok(());
    };

    println!("{} ({})", subject.name, window.label());
    println!();
    println!("{}", summary.summary_text);
    if !summary.notes.is_empty() {
        println!();
        println!("Notes:");
        for note in &summary.notes {
            println!("  - {}", note);
        }
    }
    if !timeline.is_empty() {
        println!();
        println!("Timeline:");
        for entry in &timeline {
            println!(
                "  {}  [{}] {}",
                entry.event_at.format("%Y-%m-%d %H:%M"),
                entry.category.as_str(),
                entry.content.replace('\n', " ")
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn default_is_lookback_ending_today() {
        let (s, e) = resolve_range(None, None, None, 30, d(3, 31)).unwrap();
        assert_eq!((s, e), (d(3, 2), d(3, 31)));
    }

    #[test]
    fn days_take_precedence() {
        let (s, e) = resolve_range(Some(7), Some(d(1, 1)), Some(d(1, 2)), 30, d(3, 31)).unwrap();
        assert_eq!((s, e), (d(3, 25), d(3, 31)));
    }

    #[test]
    fn explicit_range() {
        let (s, e) = resolve_range(None, Some(d(3, 6)), Some(d(3, 19)), 30, d(3, 31)).unwrap();
        assert_eq!((s, e), (d(3, 6), d(3, 19)));
    }

    #[test]
    fn invalid_ranges_are_validation_errors() {
        use pawlog_core::error::classify;

        let err = resolve_range(Some(0), None, None, 30, d(3, 31)).unwrap_err();
        assert!(matches!(classify(&err), Some(Error::Validation(_))));

        let err = resolve_range(None, Some(d(3, 20)), Some(d(3, 1)), 30, d(3, 31)).unwrap_err();
        assert!(matches!(classify(&err), Some(Error::Validation(_))));

        let err = parse_date("03/04/2024").unwrap_err();
        assert!(matches!(classify(&err), Some(Error::Validation(_))));
    }
}
