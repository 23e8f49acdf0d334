//! Core data models for Pawlog.
//!
//! Raw logs are one struct per stream, each sharing a flattened
//! [`LogMeta`] header, and wrapped in the [`LogEntry`] sum type for
//! import and storage. Derived records ([`WeeklySummary`],
//! [`TimelineEntry`]) and index descriptors ([`DocumentSpec`],
//! [`Corpus`]) live here as well so both the core algorithms and the
//! storage backends share one vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::window::WeekWindow;

pub type SubjectId = i64;

/// A tracked dog. `name` is the label used in narratives, document
/// headers, and prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

/// Fields shared by every log stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMeta {
    /// Assigned by storage; `0` for records that have not been persisted.
    #[serde(default)]
    pub id: i64,
    pub subject_id: SubjectId,
    /// Explicit event time, when the logger recorded one.
    #[serde(default)]
    pub event_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LogMeta {
    /// The explicit event time, falling back to the creation time.
    pub fn effective_at(&self) -> DateTime<Utc> {
        self.event_at.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationKind {
    Urination,
    Defecation,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoolQuality {
    Normal,
    Soft,
    Hard,
    Bloody,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    All,
    Half,
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayKind {
    Run,
    Pull,
    Cuddle,
    Lick,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
    Night,
    Midnight,
}

impl DayPeriod {
    pub fn is_night(self) -> bool {
        matches!(self, DayPeriod::Night | DayPeriod::Midnight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Note,
    Custom,
    Medication,
    Consultation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elimination {
    #[serde(flatten)]
    pub meta: LogMeta,
    pub kind: EliminationKind,
    pub succeeded: bool,
    pub stool_quality: StoolQuality,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feeding {
    #[serde(flatten)]
    pub meta: LogMeta,
    pub meal_slot: MealSlot,
    #[serde(default)]
    pub grams: Option<f64>,
    #[serde(default)]
    pub completion: Option<Completion>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sleep {
    #[serde(flatten)]
    pub meta: LogMeta,
    pub duration_minutes: u32,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Walk {
    #[serde(flatten)]
    pub meta: LogMeta,
    pub minutes: u32,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    #[serde(flatten)]
    pub meta: LogMeta,
    pub minutes: u32,
    pub play_kind: PlayKind,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocalization {
    #[serde(flatten)]
    pub meta: LogMeta,
    #[serde(default)]
    pub period: Option<DayPeriod>,
    /// What happened before the barking started.
    #[serde(default)]
    pub before: Option<String>,
    /// How the episode ended.
    #[serde(default)]
    pub after: Option<String>,
    /// 1 (easy to settle) to 5.
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeNote {
    #[serde(flatten)]
    pub meta: LogMeta,
    pub kind: NoteKind,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

/// One raw log record, tagged by stream.
///
/// Serialized with an inline `"stream"` tag, which is also the JSON-lines
/// import format:
///
/// ```json
/// {"stream":"feeding","subject_id":1,"created_at":"2024-03-04T08:00:00Z","meal_slot":"breakfast","grams":200}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
pub enum LogEntry {
    Elimination(Elimination),
    Feeding(Feeding),
    Sleep(Sleep),
    Walk(Walk),
    Play(Play),
    Vocalization(Vocalization),
    Note(FreeNote),
}

impl LogEntry {
    pub fn meta(&self) -> &LogMeta {
        match self {
            LogEntry::Elimination(e) => &e.meta,
            LogEntry::Feeding(e) => &e.meta,
            LogEntry::Sleep(e) => &e.meta,
            LogEntry::Walk(e) => &e.meta,
            LogEntry::Play(e) => &e.meta,
            LogEntry::Vocalization(e) => &e.meta,
            LogEntry::Note(e) => &e.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut LogMeta {
        match self {
            LogEntry::Elimination(e) => &mut e.meta,
            LogEntry::Feeding(e) => &mut e.meta,
            LogEntry::Sleep(e) => &mut e.meta,
            LogEntry::Walk(e) => &mut e.meta,
            LogEntry::Play(e) => &mut e.meta,
            LogEntry::Vocalization(e) => &mut e.meta,
            LogEntry::Note(e) => &mut e.meta,
        }
    }

    pub fn stream(&self) -> Stream {
        match self {
            LogEntry::Elimination(_) => Stream::Elimination,
            LogEntry::Feeding(_) => Stream::Feeding,
            LogEntry::Sleep(_) => Stream::Sleep,
            LogEntry::Walk(_) => Stream::Walk,
            LogEntry::Play(_) => Stream::Play,
            LogEntry::Vocalization(_) => Stream::Vocalization,
            LogEntry::Note(_) => Stream::Note,
        }
    }
}

/// The seven log streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Elimination,
    Feeding,
    Sleep,
    Walk,
    Play,
    Vocalization,
    Note,
}

impl Stream {
    pub const ALL: [Stream; 7] = [
        Stream::Elimination,
        Stream::Feeding,
        Stream::Sleep,
        Stream::Walk,
        Stream::Play,
        Stream::Vocalization,
        Stream::Note,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Elimination => "elimination",
            Stream::Feeding => "feeding",
            Stream::Sleep => "sleep",
            Stream::Walk => "walk",
            Stream::Play => "play",
            Stream::Vocalization => "vocalization",
            Stream::Note => "note",
        }
    }
}

/// Every raw log for one subject and one window, grouped by stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeekLogs {
    pub eliminations: Vec<Elimination>,
    pub feedings: Vec<Feeding>,
    pub sleeps: Vec<Sleep>,
    pub walks: Vec<Walk>,
    pub plays: Vec<Play>,
    pub vocalizations: Vec<Vocalization>,
    pub notes: Vec<FreeNote>,
}

impl WeekLogs {
    pub fn push(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Elimination(e) => self.eliminations.push(e),
            LogEntry::Feeding(e) => self.feedings.push(e),
            LogEntry::Sleep(e) => self.sleeps.push(e),
            LogEntry::Walk(e) => self.walks.push(e),
            LogEntry::Play(e) => self.plays.push(e),
            LogEntry::Vocalization(e) => self.vocalizations.push(e),
            LogEntry::Note(e) => self.notes.push(e),
        }
    }

    pub fn len(&self) -> usize {
        self.eliminations.len()
            + self.feedings.len()
            + self.sleeps.len()
            + self.walks.len()
            + self.plays.len()
            + self.vocalizations.len()
            + self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Numeric statistics for one window.
///
/// `None` means the underlying stream had no entries in the window. The
/// night-bark count is always reported; zero is a meaningful value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub avg_one_freq_day: Option<f64>,
    pub avg_two_freq_day: Option<f64>,
    pub toilet_fail_rate: Option<f64>,
    pub avg_food_grams: Option<f64>,
    pub avg_walk_minutes: Option<f64>,
    pub avg_walk_distance_km: Option<f64>,
    pub avg_sleep_hours: Option<f64>,
    pub bark_night_count: u32,
}

/// Derived, fully recomputed summary for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub window: WeekWindow,
    pub metrics: SummaryMetrics,
    pub notes: Vec<String>,
    pub summary_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineCategory {
    Toilet,
    Food,
    Walk,
    Sleep,
    Play,
    Bark,
    Note,
    Custom,
}

impl TimelineCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TimelineCategory::Toilet => "toilet",
            TimelineCategory::Food => "food",
            TimelineCategory::Walk => "walk",
            TimelineCategory::Sleep => "sleep",
            TimelineCategory::Play => "play",
            TimelineCategory::Bark => "bark",
            TimelineCategory::Note => "note",
            TimelineCategory::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "toilet" => Some(TimelineCategory::Toilet),
            "food" => Some(TimelineCategory::Food),
            "walk" => Some(TimelineCategory::Walk),
            "sleep" => Some(TimelineCategory::Sleep),
            "play" => Some(TimelineCategory::Play),
            "bark" => Some(TimelineCategory::Bark),
            "note" => Some(TimelineCategory::Note),
            "custom" => Some(TimelineCategory::Custom),
            _ => None,
        }
    }
}

/// One free-text fragment pulled out of a raw log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub event_at: DateTime<Utc>,
    pub category: TimelineCategory,
    pub source_stream: Stream,
    pub source_record_id: i64,
    pub title: Option<String>,
    pub content: String,
    pub metadata: Value,
}

/// Retrieval partition a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corpus {
    Internal,
    External,
}

impl Corpus {
    pub fn as_str(self) -> &'static str {
        match self {
            Corpus::Internal => "internal",
            Corpus::External => "external",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    WeeklySummary,
    WeekTimeline,
    ExternalAdvice,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::WeeklySummary => "weekly_summary",
            DocumentKind::WeekTimeline => "week_timeline",
            DocumentKind::ExternalAdvice => "external_advice",
        }
    }

    pub fn corpus(self) -> Corpus {
        match self {
            DocumentKind::WeeklySummary | DocumentKind::WeekTimeline => Corpus::Internal,
            DocumentKind::ExternalAdvice => Corpus::External,
        }
    }
}

/// A logical document subject to chunking, identified by a stable
/// source key. `metadata` is copied onto every chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSpec {
    pub source_key: String,
    pub title: String,
    pub kind: DocumentKind,
    pub subject_id: Option<SubjectId>,
    pub metadata: Map<String, Value>,
}

impl DocumentSpec {
    pub fn corpus(&self) -> Corpus {
        self.kind.corpus()
    }

    pub fn weekly_summary(subject: &Subject, window: &WeekWindow) -> Self {
        Self::internal(DocumentKind::WeeklySummary, "Weekly Summary", subject, window)
    }

    pub fn week_timeline(subject: &Subject, window: &WeekWindow) -> Self {
        Self::internal(DocumentKind::WeekTimeline, "Weekly Texts", subject, window)
    }

    fn internal(kind: DocumentKind, label: &str, subject: &Subject, window: &WeekWindow) -> Self {
        let start = window.start.to_string();
        let end = window.end.to_string();

        let mut metadata = Map::new();
        metadata.insert("corpus".into(), Value::from(Corpus::Internal.as_str()));
        metadata.insert("sourceType".into(), Value::from(kind.as_str()));
        metadata.insert("subjectId".into(), Value::from(subject.id));
        metadata.insert("subjectName".into(), Value::from(subject.name.clone()));
        metadata.insert("weekStart".into(), Value::from(start.clone()));
        metadata.insert("weekEnd".into(), Value::from(end.clone()));

        Self {
            source_key: format!("{}:{}:{}:{}", kind.as_str(), subject.id, start, end),
            title: format!("{} - {} ({} ~ {})", label, subject.name, start, end),
            kind,
            subject_id: Some(subject.id),
            metadata,
        }
    }

    /// An external advice file. `path` is relative to the advice root.
    pub fn external_advice(path: &str, title: &str, topic: Option<&str>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("corpus".into(), Value::from(Corpus::External.as_str()));
        metadata.insert(
            "sourceType".into(),
            Value::from(DocumentKind::ExternalAdvice.as_str()),
        );
        metadata.insert("filePath".into(), Value::from(path));
        metadata.insert("title".into(), Value::from(title));
        if let Some(topic) = topic {
            metadata.insert("topic".into(), Value::from(topic));
        }

        Self {
            source_key: format!("{}:{}", DocumentKind::ExternalAdvice.as_str(), path),
            title: title.to_string(),
            kind: DocumentKind::ExternalAdvice,
            subject_id: None,
            metadata,
        }
    }
}

