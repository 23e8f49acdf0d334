//! SQLite-backed store.
//!
//! [`SqliteStore`] implements all three storage traits from
//! `pawlog_core::store` over one [`SqlitePool`]: raw log reads
//! ([`LogRepository`]), weekly records ([`SummaryStore`]), and the
//! document/chunk index ([`IndexStore`]). It also owns the write paths
//! the CLI needs for subjects and log import.
//!
//! Vectors are stored as little-endian `f32` BLOBs and searched by brute
//! force: every chunk in the requested partition is scored with cosine
//! similarity in Rust, then sorted and truncated.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use pawlog_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use pawlog_core::error::Error;
use pawlog_core::models::{
    Corpus, DocumentSpec, Elimination, Feeding, FreeNote, LogEntry, LogMeta, Play, Sleep,
    Stream, Subject, SubjectId, SummaryMetrics, TimelineCategory, TimelineEntry, Vocalization,
    Walk, WeeklySummary,
};
use pawlog_core::store::{
    CorpusFilter, IndexStore, LogRepository, NewChunk, ScoredChunk, SummaryStore,
};
use pawlog_core::window::WeekWindow;

const VECTOR_DIMS_KEY: &str = "vector_dims";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn add_subject(&self, name: &str) -> Result<Subject> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("subject name must not be empty"));
        }
        let id = sqlx::query("INSERT INTO subjects (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(Subject {
            id,
            name: name.to_string(),
        })
    }

    pub async fn subjects(&self) -> Result<Vec<Subject>> {
        let rows = sqlx::query("SELECT id, name FROM subjects ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| Subject {
                id: r.get("id"),
                name: r.get("name"),
            })
            .collect())
    }

    /// Persist one raw log and return its row ID. The subject must exist.
    pub async fn insert_log(&self, entry: &LogEntry) -> Result<i64> {
        let meta = entry.meta();
        let event_at = meta.event_at.map(|t| t.timestamp_millis());
        let created_at = meta.created_at.timestamp_millis();

        let query = match entry {
            LogEntry::Elimination(e) => sqlx::query(
                "INSERT INTO elimination_logs (subject_id, event_at, created_at, kind, succeeded, stool_quality, comment) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(meta.subject_id)
            .bind(event_at)
            .bind(created_at)
            .bind(enum_text(&e.kind)?)
            .bind(e.succeeded)
            .bind(enum_text(&e.stool_quality)?)
            .bind(e.comment.clone()),
            LogEntry::Feeding(f) => sqlx::query(
                "INSERT INTO feeding_logs (subject_id, event_at, created_at, meal_slot, grams, completion, comment) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(meta.subject_id)
            .bind(event_at)
            .bind(created_at)
            .bind(enum_text(&f.meal_slot)?)
            .bind(f.grams)
            .bind(f.completion.as_ref().map(enum_text).transpose()?)
            .bind(f.comment.clone()),
            LogEntry::Sleep(s) => sqlx::query(
                "INSERT INTO sleep_logs (subject_id, event_at, created_at, duration_minutes, comment) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(meta.subject_id)
            .bind(event_at)
            .bind(created_at)
            .bind(s.duration_minutes)
            .bind(s.comment.clone()),
            LogEntry::Walk(w) => sqlx::query(
                "INSERT INTO walk_logs (subject_id, event_at, created_at, minutes, distance_km, weather, comment) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(meta.subject_id)
            .bind(event_at)
            .bind(created_at)
            .bind(w.minutes)
            .bind(w.distance_km)
            .bind(w.weather.clone())
            .bind(w.comment.clone()),
            LogEntry::Play(p) => sqlx::query(
                "INSERT INTO play_logs (subject_id, event_at, created_at, minutes, play_kind, comment) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(meta.subject_id)
            .bind(event_at)
            .bind(created_at)
            .bind(p.minutes)
            .bind(enum_text(&p.play_kind)?)
            .bind(p.comment.clone()),
            LogEntry::Vocalization(v) => sqlx::query(
                "INSERT INTO vocalization_logs (subject_id, event_at, created_at, period, before_text, after_text, difficulty) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(meta.subject_id)
            .bind(event_at)
            .bind(created_at)
            .bind(v.period.as_ref().map(enum_text).transpose()?)
            .bind(v.before.clone())
            .bind(v.after.clone())
            .bind(v.difficulty),
            LogEntry::Note(n) => sqlx::query(
                "INSERT INTO note_logs (subject_id, event_at, created_at, kind, title, content) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(meta.subject_id)
            .bind(event_at)
            .bind(created_at)
            .bind(enum_text(&n.kind)?)
            .bind(n.title.clone())
            .bind(n.content.clone()),
        };

        let id = query
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert {} log", entry.stream().as_str()))?
            .last_insert_rowid();
        Ok(id)
    }

    async fn stream_rows(
        &self,
        table: &str,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SqliteRow>> {
        let sql = format!(
            "SELECT * FROM {} WHERE subject_id = ? AND COALESCE(event_at, created_at) BETWEEN ? AND ? ORDER BY COALESCE(event_at, created_at), id",
            table
        );
        let rows = sqlx::query(&sql)
            .bind(subject_id)
            .bind(from.timestamp_millis())
            .bind(to.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

fn enum_text<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        Value::String(s) => Ok(s),
        other => bail!("expected a string-valued enum, got {}", other),
    }
}

fn enum_from<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_value(Value::String(text.to_string()))
        .with_context(|| format!("unrecognized stored value '{}'", text))
}

fn opt_enum_from<T: DeserializeOwned>(text: Option<String>) -> Result<Option<T>> {
    text.as_deref().map(enum_from).transpose()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("timestamp out of range: {}", ms))
}

fn meta_from_row(row: &SqliteRow) -> Result<LogMeta> {
    let event_at: Option<i64> = row.get("event_at");
    Ok(LogMeta {
        id: row.get("id"),
        subject_id: row.get("subject_id"),
        event_at: event_at.map(from_millis).transpose()?,
        created_at: from_millis(row.get("created_at"))?,
    })
}

fn parse_json<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text).with_context(|| format!("corrupt {} JSON", what))
}

#[async_trait]
impl LogRepository for SqliteStore {
    async fn subject(&self, id: SubjectId) -> Result<Option<Subject>> {
        let row = sqlx::query("SELECT id, name FROM subjects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Subject {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    async fn eliminations(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Elimination>> {
        self.stream_rows("elimination_logs", subject_id, from, to)
            .await?
            .iter()
            .map(|r| -> Result<Elimination> {
                Ok(Elimination {
                    meta: meta_from_row(r)?,
                    kind: enum_from(r.get("kind"))?,
                    succeeded: r.get("succeeded"),
                    stool_quality: enum_from(r.get("stool_quality"))?,
                    comment: r.get("comment"),
                })
            })
            .collect()
    }

    async fn feedings(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Feeding>> {
        self.stream_rows("feeding_logs", subject_id, from, to)
            .await?
            .iter()
            .map(|r| -> Result<Feeding> {
                Ok(Feeding {
                    meta: meta_from_row(r)?,
                    meal_slot: enum_from(r.get("meal_slot"))?,
                    grams: r.get("grams"),
                    completion: opt_enum_from(r.get("completion"))?,
                    comment: r.get("comment"),
                })
            })
            .collect()
    }

    async fn sleeps(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sleep>> {
        self.stream_rows("sleep_logs", subject_id, from, to)
            .await?
            .iter()
            .map(|r| -> Result<Sleep> {
                Ok(Sleep {
                    meta: meta_from_row(r)?,
                    duration_minutes: r.get("duration_minutes"),
                    comment: r.get("comment"),
                })
            })
            .collect()
    }

    async fn walks(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Walk>> {
        self.stream_rows("walk_logs", subject_id, from, to)
            .await?
            .iter()
            .map(|r| -> Result<Walk> {
                Ok(Walk {
                    meta: meta_from_row(r)?,
                    minutes: r.get("minutes"),
                    distance_km: r.get("distance_km"),
                    weather: r.get("weather"),
                    comment: r.get("comment"),
                })
            })
            .collect()
    }

    async fn plays(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Play>> {
        self.stream_rows("play_logs", subject_id, from, to)
            .await?
            .iter()
            .map(|r| -> Result<Play> {
                Ok(Play {
                    meta: meta_from_row(r)?,
                    minutes: r.get("minutes"),
                    play_kind: enum_from(r.get("play_kind"))?,
                    comment: r.get("comment"),
                })
            })
            .collect()
    }

    async fn vocalizations(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Vocalization>> {
        self.stream_rows("vocalization_logs", subject_id, from, to)
            .await?
            .iter()
            .map(|r| -> Result<Vocalization> {
                Ok(Vocalization {
                    meta: meta_from_row(r)?,
                    period: opt_enum_from(r.get("period"))?,
                    before: r.get("before_text"),
                    after: r.get("after_text"),
                    difficulty: r.get("difficulty"),
                })
            })
            .collect()
    }

    async fn notes(
        &self,
        subject_id: SubjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FreeNote>> {
        self.stream_rows("note_logs", subject_id, from, to)
            .await?
            .iter()
            .map(|r| -> Result<FreeNote> {
                Ok(FreeNote {
                    meta: meta_from_row(r)?,
                    kind: enum_from(r.get("kind"))?,
                    title: r.get("title"),
                    content: r.get("content"),
                })
            })
            .collect()
    }
}

fn summary_from_row(subject_id: SubjectId, row: &SqliteRow) -> Result<WeeklySummary> {
    let start: String = row.get("week_start");
    let end: String = row.get("week_end");
    let metrics: SummaryMetrics = parse_json(row.get("metrics_json"), "metrics")?;
    let notes: Vec<String> = parse_json(row.get("notes_json"), "notes")?;
    Ok(WeeklySummary {
        window: WeekWindow {
            subject_id,
            start: NaiveDate::parse_from_str(&start, "%Y-%m-%d")?,
            end: NaiveDate::parse_from_str(&end, "%Y-%m-%d")?,
        },
        metrics,
        notes,
        summary_text: row.get("summary_text"),
    })
}

#[async_trait]
impl SummaryStore for SqliteStore {
    async fn upsert_summary(&self, summary: &WeeklySummary) -> Result<()> {
        let w = &summary.window;
        sqlx::query(
            r#"
            INSERT INTO week_summaries (subject_id, week_start, week_end, metrics_json,
                                        notes_json, summary_text, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(subject_id, week_start, week_end) DO UPDATE SET
                metrics_json = excluded.metrics_json,
                notes_json = excluded.notes_json,
                summary_text = excluded.summary_text,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(w.subject_id)
        .bind(w.start.to_string())
        .bind(w.end.to_string())
        .bind(serde_json::to_string(&summary.metrics)?)
        .bind(serde_json::to_string(&summary.notes)?)
        .bind(&summary.summary_text)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn summary(&self, window: &WeekWindow) -> Result<Option<WeeklySummary>> {
        let row = sqlx::query(
            "SELECT week_start, week_end, metrics_json, notes_json, summary_text FROM week_summaries WHERE subject_id = ? AND week_start = ? AND week_end = ?",
        )
        .bind(window.subject_id)
        .bind(window.start.to_string())
        .bind(window.end.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| summary_from_row(window.subject_id, &r))
            .transpose()
    }

    async fn summaries_in_range(
        &self,
        subject_id: SubjectId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeeklySummary>> {
        let rows = sqlx::query(
            r#"
            SELECT week_start, week_end, metrics_json, notes_json, summary_text
            FROM week_summaries
            WHERE subject_id = ? AND week_end >= ? AND week_start <= ?
            ORDER BY week_start
            "#,
        )
        .bind(subject_id)
        .bind(start.to_string())
        .bind(end.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| summary_from_row(subject_id, r))
            .collect()
    }

    async fn replace_timeline(&self, window: &WeekWindow, entries: &[TimelineEntry]) -> Result<()> {
        let start = window.start.to_string();
        let end = window.end.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM week_timeline WHERE subject_id = ? AND week_start = ? AND week_end = ?")
            .bind(window.subject_id)
            .bind(&start)
            .bind(&end)
            .execute(&mut *tx)
            .await?;

        for e in entries {
            sqlx::query(
                r#"
                INSERT INTO week_timeline (subject_id, week_start, week_end, event_at, category,
                                           source_stream, source_record_id, title, content,
                                           metadata_json)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(window.subject_id)
            .bind(&start)
            .bind(&end)
            .bind(e.event_at.timestamp_millis())
            .bind(e.category.as_str())
            .bind(e.source_stream.as_str())
            .bind(e.source_record_id)
            .bind(&e.title)
            .bind(&e.content)
            .bind(e.metadata.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn timeline(&self, window: &WeekWindow) -> Result<Vec<TimelineEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT event_at, category, source_stream, source_record_id, title, content, metadata_json
            FROM week_timeline
            WHERE subject_id = ? AND week_start = ? AND week_end = ?
            ORDER BY event_at, id
            "#,
        )
        .bind(window.subject_id)
        .bind(window.start.to_string())
        .bind(window.end.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<TimelineEntry> {
                let category: String = r.get("category");
                let stream: String = r.get("source_stream");
                Ok(TimelineEntry {
                    event_at: from_millis(r.get("event_at"))?,
                    category: TimelineCategory::parse(&category)
                        .with_context(|| format!("unknown timeline category '{}'", category))?,
                    source_stream: enum_from::<Stream>(&stream)?,
                    source_record_id: r.get("source_record_id"),
                    title: r.get("title"),
                    content: r.get("content"),
                    metadata: parse_json(r.get("metadata_json"), "timeline metadata")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn upsert_document(&self, doc: &DocumentSpec) -> Result<String> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, source_key, title, kind, corpus, subject_id,
                                   metadata_json, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_key) DO UPDATE SET
                title = excluded.title,
                metadata_json = excluded.metadata_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&doc.source_key)
        .bind(&doc.title)
        .bind(doc.kind.as_str())
        .bind(doc.corpus().as_str())
        .bind(doc.subject_id)
        .bind(Value::Object(doc.metadata.clone()).to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        self.document_id(&doc.source_key)
            .await?
            .with_context(|| format!("document {} vanished after upsert", doc.source_key))
    }

    async fn document_id(&self, source_key: &str) -> Result<Option<String>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM documents WHERE source_key = ?")
            .bind(source_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_chunks(
        &self,
        document_id: &str,
        doc: &DocumentSpec,
        chunks: &[NewChunk],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, content, embedding,
                                    metadata_json, corpus, subject_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(document_id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(Value::Object(chunk.metadata.clone()).to_string())
            .bind(doc.corpus().as_str())
            .bind(doc.subject_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        filter: &CorpusFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = match filter {
            CorpusFilter::Internal { subject_id } => {
                sqlx::query(
                    "SELECT document_id, content, metadata_json, embedding FROM chunks WHERE corpus = ? AND subject_id = ?",
                )
                .bind(Corpus::Internal.as_str())
                .bind(subject_id)
                .fetch_all(&self.pool)
                .await?
            }
            CorpusFilter::External => {
                sqlx::query(
                    "SELECT document_id, content, metadata_json, embedding FROM chunks WHERE corpus = ?",
                )
                .bind(Corpus::External.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata: String = row.get("metadata_json");
                ScoredChunk {
                    document_id: row.get("document_id"),
                    content: row.get("content"),
                    metadata: serde_json::from_str(&metadata)
                        .unwrap_or_else(|_| Value::Object(Map::new())),
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
                }
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
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
            .bind(VECTOR_DIMS_KEY)
            .fetch_optional(&self.pool)
            .await?;
        value
            .map(|v| {
                v.parse::<usize>()
                    .with_context(|| format!("corrupt vector width in index_meta: '{}'", v))
            })
            .transpose()
    }

    async fn declare_vector_dims(&self, dims: usize) -> Result<()> {
        match self.vector_dims().await? {
            Some(existing) if existing != dims => Err(Error::configuration(format!(
                "index is declared with {}-dimensional vectors, not {}",
                existing, dims
            ))),
            Some(_) => Ok(()),
            None => {
                sqlx::query("INSERT OR IGNORE INTO index_meta (key, value) VALUES (?, ?)")
                    .bind(VECTOR_DIMS_KEY)
                    .bind(dims.to_string())
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }
        }
    }
}
