//! Monday-aligned week windows.
//!
//! A [`WeekWindow`] covers Monday 00:00:00.000 UTC through Sunday
//! 23:59:59.999 UTC of one calendar week for one subject.
//! [`week_windows`] partitions an arbitrary date range into the windows
//! it touches, including partial weeks at both ends.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use pawlog_core::window::week_windows;
//!
//! // Wednesday through the following Tuesday touches two calendar weeks.
//! let start = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();
//! let weeks = week_windows(1, start, end).unwrap();
//! assert_eq!(weeks.len(), 2);
//! assert_eq!(weeks[0].start.to_string(), "2024-03-04");
//! assert_eq!(weeks[1].end.to_string(), "2024-03-17");
//! ```

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::SubjectId;

/// Days in every window. Per-day averages always divide by this.
pub const DAYS_PER_WINDOW: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekWindow {
    pub subject_id: SubjectId,
    /// Monday.
    pub start: NaiveDate,
    /// Sunday, `start + 6 days`.
    pub end: NaiveDate,
}

impl WeekWindow {
    /// The window containing `date`.
    pub fn containing(subject_id: SubjectId, date: NaiveDate) -> Self {
        let start = monday_on_or_before(date);
        Self {
            subject_id,
            start,
            end: start + Duration::days(DAYS_PER_WINDOW - 1),
        }
    }

    /// Monday 00:00:00.000 UTC.
    pub fn start_at(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Sunday 23:59:59.999 UTC.
    pub fn end_at(&self) -> DateTime<Utc> {
        (self.end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc()
            - Duration::milliseconds(1)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start_at() && ts <= self.end_at()
    }

    pub fn next(&self) -> Self {
        Self {
            subject_id: self.subject_id,
            start: self.start + Duration::days(DAYS_PER_WINDOW),
            end: self.end + Duration::days(DAYS_PER_WINDOW),
        }
    }

    /// `"2024-03-04 ~ 2024-03-10"`, as used in document headers.
    pub fn label(&self) -> String {
        format!("{} ~ {}", self.start, self.end)
    }
}

/// The Monday on or before `date` (a Sunday maps six days back).
pub fn monday_on_or_before(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// All windows overlapping `[start, end]`, in order.
///
/// Returns a validation error when `start > end`.
pub fn week_windows(subject_id: SubjectId, start: NaiveDate, end: NaiveDate) -> Result<Vec<WeekWindow>> {
    if start > end {
        return Err(Error::validation(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }

    let mut windows = Vec::new();
    let mut window = WeekWindow::containing(subject_id, start);
    while window.start <= end {
        if window.end >= start {
            windows.push(window);
        }
        window = window.next();
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, Error};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sunday_maps_to_previous_monday() {
        // 2024-03-10 is a Sunday.
        assert_eq!(monday_on_or_before(date(2024, 3, 10)), date(2024, 3, 4));
        assert_eq!(monday_on_or_before(date(2024, 3, 4)), date(2024, 3, 4));
        assert_eq!(monday_on_or_before(date(2024, 3, 7)), date(2024, 3, 4));
    }

    #[test]
    fn single_day_range() {
        let weeks = week_windows(3, date(2024, 3, 10), date(2024, 3, 10)).unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].start, date(2024, 3, 4));
        assert_eq!(weeks[0].end, date(2024, 3, 10));
        assert_eq!(weeks[0].subject_id, 3);
    }

    #[test]
    fn partition_is_contiguous_and_covers_range() {
        let starts = [date(2023, 12, 28), date(2024, 2, 26), date(2024, 3, 3)];
        for start in starts {
            for span in [0i64, 1, 6, 7, 13, 30, 95] {
                let end = start + Duration::days(span);
                let weeks = week_windows(1, start, end).unwrap();

                assert!(!weeks.is_empty());
                for w in &weeks {
                    assert_eq!(w.end - w.start, Duration::days(6));
                    assert_eq!(w.start.weekday(), chrono::Weekday::Mon);
                }
                for pair in weeks.windows(2) {
                    assert_eq!(pair[1].start, pair[0].end + Duration::days(1));
                }
                assert!(weeks[0].start <= start);
                assert!(weeks.last().unwrap().end >= end);

                let mut day = start;
                while day <= end {
                    let covering = weeks
                        .iter()
                        .filter(|w| w.start <= day && day <= w.end)
                        .count();
                    assert_eq!(covering, 1, "day {} covered {} times", day, covering);
                    day += Duration::days(1);
                }
            }
        }
    }

    #[test]
    fn reversed_range_is_validation_error() {
        let err = week_windows(1, date(2024, 3, 10), date(2024, 3, 1)).unwrap_err();
        assert!(matches!(classify(&err), Some(Error::Validation(_))));
    }

    #[test]
    fn instant_bounds_are_inclusive() {
        let w = WeekWindow::containing(1, date(2024, 3, 6));
        assert_eq!(w.start_at().to_rfc3339(), "2024-03-04T00:00:00+00:00");
        assert_eq!(
            w.end_at().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            "2024-03-10T23:59:59.999"
        );
        assert!(w.contains(w.start_at()));
        assert!(w.contains(w.end_at()));
        assert!(!w.contains(w.end_at() + Duration::milliseconds(1)));
        assert!(!w.contains(w.start_at() - Duration::milliseconds(1)));
    }

    #[test]
    fn label_format() {
        let w = WeekWindow::containing(1, date(2024, 3, 6));
        assert_eq!(w.label(), "2024-03-04 ~ 2024-03-10");
    }
}
