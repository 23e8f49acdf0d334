//! Weekly aggregation: raw logs for one window in, [`WeeklySummary`] out.
//!
//! # Metrics
//!
//! | Metric | Formula | Absent when |
//! |--------|---------|-------------|
//! | `avg_one_freq_day` / `avg_two_freq_day` | mean per-day count over days on which that kind occurred | kind never logged |
//! | `toilet_fail_rate` | `failed / total × 100` | no eliminations |
//! | `avg_food_grams` | `Σ grams / 7`, whole grams | no feedings |
//! | `avg_walk_minutes` | `Σ minutes / 7`, whole minutes | no walks |
//! | `avg_walk_distance_km` | `Σ km / 7` | no walks |
//! | `avg_sleep_hours` | `Σ minutes / (7 × 60)` | no sleep logs |
//! | `bark_night_count` | vocalizations tagged night or midnight | never (0 is valid) |
//!
//! Fractional values are rounded to two decimals. `Both` eliminations
//! count toward both kinds. Days are UTC calendar days of the effective
//! timestamp.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{EliminationKind, Subject, SummaryMetrics, WeekLogs, WeeklySummary};
use crate::narrative;
use crate::window::{WeekWindow, DAYS_PER_WINDOW};

/// Build the complete summary (metrics, notes, narrative) for one window.
pub fn summarize(subject: &Subject, window: &WeekWindow, logs: &WeekLogs) -> WeeklySummary {
    let metrics = compute_metrics(logs);
    let summary_text = narrative::render(&subject.name, window, &metrics);
    WeeklySummary {
        window: *window,
        metrics,
        notes: collect_notes(logs),
        summary_text,
    }
}

pub fn compute_metrics(logs: &WeekLogs) -> SummaryMetrics {
    let days = DAYS_PER_WINDOW as f64;
    let (avg_one_freq_day, avg_two_freq_day) = elimination_frequency(logs);

    let toilet_fail_rate = if logs.eliminations.is_empty() {
        None
    } else {
        let failed = logs.eliminations.iter().filter(|e| !e.succeeded).count();
        Some(round2(failed as f64 / logs.eliminations.len() as f64 * 100.0))
    };

    let avg_food_grams = if logs.feedings.is_empty() {
        None
    } else {
        let total: f64 = logs.feedings.iter().map(|f| f.grams.unwrap_or(0.0)).sum();
        Some((total / days).round())
    };

    let (avg_walk_minutes, avg_walk_distance_km) = if logs.walks.is_empty() {
        (None, None)
    } else {
        let minutes: f64 = logs.walks.iter().map(|w| w.minutes as f64).sum();
        let km: f64 = logs.walks.iter().map(|w| w.distance_km.unwrap_or(0.0)).sum();
        (Some((minutes / days).round()), Some(round2(km / days)))
    };

    let avg_sleep_hours = if logs.sleeps.is_empty() {
        None
    } else {
        let minutes: f64 = logs.sleeps.iter().map(|s| s.duration_minutes as f64).sum();
        Some(round2(minutes / (days * 60.0)))
    };

    let bark_night_count = logs
        .vocalizations
        .iter()
        .filter(|v| v.period.is_some_and(|p| p.is_night()))
        .count() as u32;

    SummaryMetrics {
        avg_one_freq_day,
        avg_two_freq_day,
        toilet_fail_rate,
        avg_food_grams,
        avg_walk_minutes,
        avg_walk_distance_km,
        avg_sleep_hours,
        bark_night_count,
    }
}

fn elimination_frequency(logs: &WeekLogs) -> (Option<f64>, Option<f64>) {
    let mut per_day: BTreeMap<NaiveDate, (u32, u32)> = BTreeMap::new();
    for e in &logs.eliminations {
        let counts = per_day
            .entry(e.meta.effective_at().date_naive())
            .or_default();
        match e.kind {
            EliminationKind::Urination => counts.0 += 1,
            EliminationKind::Defecation => counts.1 += 1,
            EliminationKind::Both => {
                counts.0 += 1;
                counts.1 += 1;
            }
        }
    }

    let mean_over_active_days = |counts: Vec<u32>| {
        let active: Vec<u32> = counts.into_iter().filter(|c| *c > 0).collect();
        if active.is_empty() {
            None
        } else {
            let sum: u32 = active.iter().sum();
            Some(round2(sum as f64 / active.len() as f64))
        }
    };

    let one = mean_over_active_days(per_day.values().map(|c| c.0).collect());
    let two = mean_over_active_days(per_day.values().map(|c| c.1).collect());
    (one, two)
}

/// Free-note contents in chronological order.
fn collect_notes(logs: &WeekLogs) -> Vec<String> {
    let mut notes: Vec<_> = logs
        .notes
        .iter()
        .filter(|n| !n.content.trim().is_empty())
        .collect();
    notes.sort_by_key(|n| n.meta.effective_at());
    notes.into_iter().map(|n| n.content.trim().to_string()).collect()
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::models::*;

    pub fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    pub fn meta(id: i64, ts: DateTime<Utc>) -> LogMeta {
        LogMeta {
            id,
            subject_id: 1,
            event_at: Some(ts),
            created_at: ts,
        }
    }

    pub fn elimination(id: i64, ts: DateTime<Utc>, kind: EliminationKind, ok: bool) -> Elimination {
        Elimination {
            meta: meta(id, ts),
            kind,
            succeeded: ok,
            stool_quality: StoolQuality::Normal,
            comment: None,
        }
    }

    pub fn feeding(id: i64, ts: DateTime<Utc>, grams: Option<f64>) -> Feeding {
        Feeding {
            meta: meta(id, ts),
            meal_slot: MealSlot::Breakfast,
            grams,
            completion: Some(Completion::All),
            comment: None,
        }
    }

    pub fn bark(id: i64, ts: DateTime<Utc>, period: Option<DayPeriod>) -> Vocalization {
        Vocalization {
            meta: meta(id, ts),
            period,
            before: None,
            after: None,
            difficulty: 2,
        }
    }

    pub fn subject() -> Subject {
        Subject {
            id: 1,
            name: "Bori".to_string(),
        }
    }
}
