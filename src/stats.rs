//! Database statistics.
//!
//! A quick overview of what is stored and indexed: subjects, raw logs per
//! stream, weekly summaries, timeline entries, and documents and chunks per
//! corpus. Used by `pawlog stats` to confirm that imports, rebuilds, and
//! indexing runs did what was expected.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;

const LOG_TABLES: [(&str, &str); 7] = [
    ("elimination", "elimination_logs"),
    ("feeding", "feeding_logs"),
    ("sleep", "sleep_logs"),
    ("walk", "walk_logs"),
    ("play", "play_logs"),
    ("vocalization", "vocalization_logs"),
    ("note", "note_logs"),
];

async fn count(pool: &SqlitePool, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let n: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(n)
}

pub async fn run_stats(config: &Config, pool: &SqlitePool) -> Result<()> {
    let subjects = count(pool, "subjects").await?;
    let summaries = count(pool, "week_summaries").await?;
    let timeline = count(pool, "week_timeline").await?;

    let mut logs = Vec::with_capacity(LOG_TABLES.len());
    for (stream, table) in LOG_TABLES {
        logs.push((stream, count(pool, table).await?));
    }
    let total_logs: i64 = logs.iter().map(|(_, n)| n).sum();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Pawlog Database Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Subjects:    {}", subjects);
    println!("  Logs:        {}", total_logs);
    for (stream, n) in &logs {
        if *n > 0 {
            println!("    {:<14} {}", stream, n);
        }
    }
    println!("  Summaries:   {}", summaries);
    println!("  Timeline:    {}", timeline);

    let corpus_rows = sqlx::query(
        r#"
        SELECT
            d.corpus,
            COUNT(DISTINCT d.id) AS doc_count,
            COUNT(c.id) AS chunk_count
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        GROUP BY d.corpus
        ORDER BY d.corpus
        "#,
    )
    .fetch_all(pool)
    .await?;

    if !corpus_rows.is_empty() {
        println!();
        println!("  By corpus:");
        println!("  {:<12} {:>6} {:>8}", "CORPUS", "DOCS", "CHUNKS");
        println!("  {}", "-".repeat(28));
        for row in &corpus_rows {
            let corpus: String = row.get("corpus");
            let docs: i64 = row.get("doc_count");
            let chunks: i64 = row.get("chunk_count");
            println!("  {:<12} {:>6} {:>8}", corpus, docs, chunks);
        }
    }

    let dims: Option<String> =
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'vector_dims'")
            .fetch_optional(pool)
            .await?;
    if let Some(dims) = dims {
        println!();
        println!("  Vector dims: {}", dims);
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
