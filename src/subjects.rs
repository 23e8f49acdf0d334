//! Subject management and raw log import.
//!
//! `pawlog import` reads JSON lines, one [`LogEntry`] per line (blank lines
//! are skipped). Lines are validated before anything is written, so a
//! malformed file imports nothing.

use anyhow::{bail, Context, Result};
use std::path::Path;

use pawlog_core::error::Error;
use pawlog_core::models::{LogEntry, Stream, Subject};
use pawlog_core::store::LogRepository;

use crate::sqlite_store::SqliteStore;

/// Resolve a subject given on the command line as an ID or an exact name.
pub async fn resolve_subject(store: &SqliteStore, arg: &str) -> Result<Subject> {
    if let Ok(id) = arg.parse::<i64>() {
        return store
            .subject(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("subject {}", id)));
    }

    let mut matches: Vec<Subject> = store
        .subjects()
        .await?
        .into_iter()
        .filter(|s| s.name == arg)
        .collect();
    match matches.len() {
        0 => Err(Error::not_found(format!("subject '{}'", arg))),
        1 => Ok(matches.remove(0)),
        n => bail!("{} subjects are named '{}'; use the numeric ID", n, arg),
    }
}

pub async fn run_subject_add(store: &SqliteStore, name: &str) -> Result<()> {
    let subject = store.add_subject(name).await?;
    println!("subject added");
    println!("  id: {}", subject.id);
    println!("  name: {}", subject.name);
    println!("ok");
    Ok(())
}

pub async fn run_subject_list(store: &SqliteStore) -> Result<()> {
    let subjects = store.subjects().await?;
    if subjects.is_empty() {
        println!("No subjects.");
        return Ok(());
    }
    println!("{:>4}  NAME", "ID");
    for s in subjects {
        println!("{:>4}  {}", s.id, s.name);
    }
    Ok(())
}

/// Parse a JSON-lines log file. Errors name the offending line.
pub fn parse_jsonl(content: &str) -> Result<Vec<LogEntry>> {
    let mut entries = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: LogEntry = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid log entry", i + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

pub async fn run_import(store: &SqliteStore, path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let entries = parse_jsonl(&content)?;

    // Every referenced subject must exist before the first insert.
    let mut subject_ids: Vec<i64> = entries.iter().map(|e| e.meta().subject_id).collect();
    subject_ids.sort_unstable();
    subject_ids.dedup();
    for id in &subject_ids {
        if store.subject(*id).await?.is_none() {
            return Err(Error::not_found(format!("subject {}", id)));
        }
    }

    let mut per_stream = [0usize; 7];
    for entry in &entries {
        store.insert_log(entry).await?;
        if let Some(slot) = Stream::ALL.iter().position(|s| *s == entry.stream()) {
            per_stream[slot] += 1;
        }
    }

    println!("import {}", path.display());
    println!("  entries: {}", entries.len());
    for (stream, count) in Stream::ALL.iter().zip(per_stream) {
        if count > 0 {
            println!("  {}: {}", stream.as_str(), count);
        }
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let content = r#"{"stream":"feeding","subject_id":1,"created_at":"2024-03-04T08:00:00Z","meal_slot":"breakfast","grams":200}

{"stream":"note","subject_id":1,"created_at":"2024-03-05T08:00:00Z","kind":"note","content":"Vet visit"}
"#;
        let entries = parse_jsonl(content).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stream(), Stream::Feeding);
        assert_eq!(entries[1].stream(), Stream::Note);
    }

    #[test]
    fn error_names_the_line() {
        let content = "{\"stream\":\"walk\",\"subject_id\":1,\"created_at\":\"2024-03-04T08:00:00Z\",\"minutes\":30}\n{\"stream\":\"walk\"}\n";
        let err = parse_jsonl(content).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
