//! Schema creation. Every statement is idempotent, so `pawlog init` can be
//! run against an existing database.
//!
//! Timestamps are stored as Unix milliseconds. Week bounds are ISO dates
//! (`YYYY-MM-DD`). Enum columns hold the same snake_case strings the JSON
//! import format uses.

use anyhow::Result;
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS subjects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS elimination_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        event_at INTEGER,
        created_at INTEGER NOT NULL,
        kind TEXT NOT NULL,
        succeeded INTEGER NOT NULL,
        stool_quality TEXT NOT NULL,
        comment TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feeding_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        event_at INTEGER,
        created_at INTEGER NOT NULL,
        meal_slot TEXT NOT NULL,
        grams REAL,
        completion TEXT,
        comment TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sleep_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        event_at INTEGER,
        created_at INTEGER NOT NULL,
        duration_minutes INTEGER NOT NULL,
        comment TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS walk_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        event_at INTEGER,
        created_at INTEGER NOT NULL,
        minutes INTEGER NOT NULL,
        distance_km REAL,
        weather TEXT,
        comment TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS play_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        event_at INTEGER,
        created_at INTEGER NOT NULL,
        minutes INTEGER NOT NULL,
        play_kind TEXT NOT NULL,
        comment TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vocalization_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        event_at INTEGER,
        created_at INTEGER NOT NULL,
        period TEXT,
        before_text TEXT,
        after_text TEXT,
        difficulty INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS note_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        event_at INTEGER,
        created_at INTEGER NOT NULL,
        kind TEXT NOT NULL,
        title TEXT,
        content TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS week_summaries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        week_start TEXT NOT NULL,
        week_end TEXT NOT NULL,
        metrics_json TEXT NOT NULL,
        notes_json TEXT NOT NULL DEFAULT '[]',
        summary_text TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(subject_id, week_start, week_end)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS week_timeline (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL REFERENCES subjects(id),
        week_start TEXT NOT NULL,
        week_end TEXT NOT NULL,
        event_at INTEGER NOT NULL,
        category TEXT NOT NULL,
        source_stream TEXT NOT NULL,
        source_record_id INTEGER NOT NULL,
        title TEXT,
        content TEXT NOT NULL,
        metadata_json TEXT NOT NULL DEFAULT '{}'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        source_key TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        kind TEXT NOT NULL,
        corpus TEXT NOT NULL,
        subject_id INTEGER,
        metadata_json TEXT NOT NULL DEFAULT '{}',
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        metadata_json TEXT NOT NULL DEFAULT '{}',
        corpus TEXT NOT NULL,
        subject_id INTEGER,
        UNIQUE(document_id, chunk_index),
        FOREIGN KEY (document_id) REFERENCES documents(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS index_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_elimination_subject ON elimination_logs(subject_id)",
    "CREATE INDEX IF NOT EXISTS idx_feeding_subject ON feeding_logs(subject_id)",
    "CREATE INDEX IF NOT EXISTS idx_sleep_subject ON sleep_logs(subject_id)",
    "CREATE INDEX IF NOT EXISTS idx_walk_subject ON walk_logs(subject_id)",
    "CREATE INDEX IF NOT EXISTS idx_play_subject ON play_logs(subject_id)",
    "CREATE INDEX IF NOT EXISTS idx_vocalization_subject ON vocalization_logs(subject_id)",
    "CREATE INDEX IF NOT EXISTS idx_note_subject ON note_logs(subject_id)",
    "CREATE INDEX IF NOT EXISTS idx_timeline_window ON week_timeline(subject_id, week_start, week_end)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_partition ON chunks(corpus, subject_id)",
];

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
