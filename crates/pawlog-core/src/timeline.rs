//! Free-text timeline extraction.
//!
//! Each stream contributes entries that carry non-blank free text:
//!
//! | Stream | Text | Category |
//! |--------|------|----------|
//! | elimination | `comment` | `toilet` |
//! | feeding | `comment` | `food` |
//! | walk | `comment` | `walk` |
//! | sleep | `comment` | `sleep` |
//! | play | `comment` | `play` |
//! | vocalization | `before`, else `after` | `bark` |
//! | note | `content` (mandatory) | `note`, or `custom` for custom notes |
//!
//! The result is sorted by `event_at`; ties keep the stream order above.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::models::{NoteKind, Stream, TimelineCategory, TimelineEntry, WeekLogs};
use crate::window::WeekWindow;

pub fn build_timeline(logs: &WeekLogs) -> Vec<TimelineEntry> {
    let mut entries = Vec::new();

    for e in &logs.eliminations {
        push_text(
            &mut entries,
            e.meta.effective_at(),
            TimelineCategory::Toilet,
            Stream::Elimination,
            e.meta.id,
            None,
            e.comment.as_deref(),
            json!({
                "kind": e.kind,
                "succeeded": e.succeeded,
                "stoolQuality": e.stool_quality,
            }),
        );
    }
    for f in &logs.feedings {
        push_text(
            &mut entries,
            f.meta.effective_at(),
            TimelineCategory::Food,
            Stream::Feeding,
            f.meta.id,
            None,
            f.comment.as_deref(),
            json!({
                "mealSlot": f.meal_slot,
                "grams": f.grams,
                "completion": f.completion,
            }),
        );
    }
    for w in &logs.walks {
        push_text(
            &mut entries,
            w.meta.effective_at(),
            TimelineCategory::Walk,
            Stream::Walk,
            w.meta.id,
            None,
            w.comment.as_deref(),
            json!({
                "minutes": w.minutes,
                "distanceKm": w.distance_km,
                "weather": w.weather,
            }),
        );
    }
    for s in &logs.sleeps {
        push_text(
            &mut entries,
            s.meta.effective_at(),
            TimelineCategory::Sleep,
            Stream::Sleep,
            s.meta.id,
            None,
            s.comment.as_deref(),
            json!({ "durationMinutes": s.duration_minutes }),
        );
    }
    for p in &logs.plays {
        push_text(
            &mut entries,
            p.meta.effective_at(),
            TimelineCategory::Play,
            Stream::Play,
            p.meta.id,
            None,
            p.comment.as_deref(),
            json!({ "minutes": p.minutes, "playKind": p.play_kind }),
        );
    }
    for v in &logs.vocalizations {
        let text = non_blank(v.before.as_deref()).or_else(|| non_blank(v.after.as_deref()));
        push_text(
            &mut entries,
            v.meta.effective_at(),
            TimelineCategory::Bark,
            Stream::Vocalization,
            v.meta.id,
            None,
            text,
            json!({
                "period": v.period,
                "difficulty": v.difficulty,
                "after": v.after,
            }),
        );
    }
    for n in &logs.notes {
        let category = if n.kind == NoteKind::Custom {
            TimelineCategory::Custom
        } else {
            TimelineCategory::Note
        };
        push_text(
            &mut entries,
            n.meta.effective_at(),
            category,
            Stream::Note,
            n.meta.id,
            non_blank(n.title.as_deref()).map(str::to_string),
            Some(&n.content),
            json!({ "kind": n.kind }),
        );
    }

    entries.sort_by_key(|e| e.event_at);
    entries
}

#[allow(clippy::too_many_arguments)]
fn push_text(
    entries: &mut Vec<TimelineEntry>,
    event_at: DateTime<Utc>,
    category: TimelineCategory,
    source_stream: Stream,
    source_record_id: i64,
    title: Option<String>,
    text: Option<&str>,
    metadata: Value,
) {
    if let Some(content) = non_blank(text) {
        entries.push(TimelineEntry {
            event_at,
            category,
            source_stream,
            source_record_id,
            title,
            content: content.to_string(),
            metadata,
        });
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Render a window's timeline as one indexable document.
///
/// Returns an empty string when there are no entries, which the indexer
/// treats as nothing to index.
pub fn render_document(subject_name: &str, window: &WeekWindow, entries: &[TimelineEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut out = format!("Dog: {}\nPeriod: {}", subject_name, window.label());
    for e in entries {
        out.push_str(&format!(
            "\n\nDate: {}\nCategory: {}\n",
            e.event_at.format("%Y-%m-%d"),
            e.category.as_str()
        ));
        if let Some(title) = &e.title {
            out.push_str(title);
            out.push('\n');
        }
        out.push_str(&e.content);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::fixtures::*;
    use crate::models::*;
    use chrono::NaiveDate;

    #[test]
    fn extracts_only_non_blank_text() {
        let mut logs = WeekLogs::default();
        let mut e = elimination(1, at(4, 7), EliminationKind::Urination, true);
        e.comment = Some("   ".into());
        logs.eliminations.push(e);

        let mut f = feeding(2, at(4, 8), Some(100.0));
        f.comment = Some("  left some kibble  ".into());
        logs.feedings.push(f);

        logs.feedings.push(feeding(3, at(4, 18), Some(100.0)));

        let timeline = build_timeline(&logs);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].content, "left some kibble");
        assert_eq!(timeline[0].category, TimelineCategory::Food);
        assert_eq!(timeline[0].source_stream, Stream::Feeding);
        assert_eq!(timeline[0].source_record_id, 2);
        assert_eq!(timeline[0].metadata["grams"], 100.0);
    }

    #[test]
    fn vocalization_prefers_before_then_after() {
        let mut logs = WeekLogs::default();
        let mut a = bark(1, at(4, 23), Some(DayPeriod::Night));
        a.before = Some("delivery truck".into());
        a.after = Some("settled".into());
        let mut b = bark(2, at(5, 23), Some(DayPeriod::Night));
        b.before = Some(" ".into());
        b.after = Some("settled after a treat".into());
        logs.vocalizations.push(a);
        logs.vocalizations.push(b);
        logs.vocalizations.push(bark(3, at(6, 23), None));

        let texts: Vec<_> = build_timeline(&logs)
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(texts, vec!["delivery truck", "settled after a treat"]);
    }

    #[test]
    fn sorted_by_event_time_across_streams() {
        let mut logs = WeekLogs::default();
        let mut f = feeding(1, at(6, 8), None);
        f.comment = Some("wednesday meal".into());
        logs.feedings.push(f);
        logs.notes.push(FreeNote {
            meta: meta(2, at(4, 9)),
            kind: NoteKind::Custom,
            title: Some("Vet".into()),
            content: "monday vet visit".into(),
        });
        logs.walks.push(Walk {
            meta: meta(3, at(5, 9)),
            minutes: 20,
            distance_km: None,
            weather: Some("rain".into()),
            comment: Some("tuesday walk".into()),
        });

        let timeline = build_timeline(&logs);
        let texts: Vec<_> = timeline.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(texts, vec!["monday vet visit", "tuesday walk", "wednesday meal"]);
        assert_eq!(timeline[0].category, TimelineCategory::Custom);
        assert_eq!(timeline[0].title.as_deref(), Some("Vet"));
    }

    #[test]
    fn ties_keep_stream_order() {
        let ts = at(4, 9);
        let mut logs = WeekLogs::default();
        logs.notes.push(FreeNote {
            meta: meta(1, ts),
            kind: NoteKind::Note,
            title: None,
            content: "note".into(),
        });
        let mut e = elimination(2, ts, EliminationKind::Both, true);
        e.comment = Some("toilet".into());
        logs.eliminations.push(e);

        let texts: Vec<_> = build_timeline(&logs).into_iter().map(|e| e.content).collect();
        assert_eq!(texts, vec!["toilet", "note"]);
    }

    #[test]
    fn render_document_layout() {
        let window = WeekWindow::containing(1, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(render_document("Bori", &window, &[]), "");

        let mut logs = WeekLogs::default();
        logs.notes.push(FreeNote {
            meta: meta(1, at(5, 9)),
            kind: NoteKind::Custom,
            title: Some("Groomer".into()),
            content: "nails trimmed".into(),
        });
        let doc = render_document("Bori", &window, &build_timeline(&logs));
        assert_eq!(
            doc,
            "Dog: Bori\nPeriod: 2024-03-04 ~ 2024-03-10\n\nDate: 2024-03-05\nCategory: custom\nGroomer\nnails trimmed"
        );
    }
}
