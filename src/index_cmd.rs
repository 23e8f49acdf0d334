//! `pawlog index internal` and `pawlog index external`.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use pawlog_core::indexer::DocumentIndexer;
use pawlog_core::store::IndexStore;

use crate::advice::index_advice;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::progress::{Progress, ProgressMode};
use crate::sqlite_store::SqliteStore;
use crate::subjects::resolve_subject;
use crate::weekly::RangeArgs;

fn build_indexer(config: &Config, store: &Arc<SqliteStore>) -> Result<DocumentIndexer> {
    let provider = create_provider(&config.embedding)?;
    let index: Arc<dyn IndexStore> = store.clone();
    Ok(DocumentIndexer::new(index, provider, config.chunking.options()))
}

pub async fn run_index_internal(
    config: &Config,
    store: &Arc<SqliteStore>,
    subject: &str,
    range: &RangeArgs,
    progress: ProgressMode,
) -> Result<()> {
    let subject = resolve_subject(store, subject).await?;
    let (start, end) = range.resolve(config)?;
    let indexer = build_indexer(config, store)?;

    let task = format!("index internal {}", subject.name);
    let weeks = pawlog_core::window::week_windows(subject.id, start, end)?.len() as u64;
    progress.report(Progress {
        task: &task,
        done: 0,
        total: weeks,
    });

    let report = indexer
        .index_range(store.as_ref(), store.as_ref(), subject.id, start, end)
        .await?;
    progress.report(Progress {
        task: &task,
        done: weeks,
        total: weeks,
    });

    let mut chunks = 0;
    let mut indexed = 0;
    println!("index internal {} ({} ~ {})", subject.name, start, end);
    for week in &report.succeeded {
        if week.summary.chunks == 0 && week.timeline.chunks == 0 {
            println!("  {}  skipped (no summary)", week.window.label());
            continue;
        }
        indexed += 1;
        chunks += week.summary.chunks + week.timeline.chunks;
        println!(
            "  {}  summary chunks: {}  timeline chunks: {}",
            week.window.label(),
            week.summary.chunks,
            week.timeline.chunks
        );
    }
    for failure in &report.failed {
        println!("  {}  failed: {}", failure.window.label(), failure.error);
    }
    println!("  weeks indexed: {}", indexed);
    println!("  weeks failed: {}", report.failed.len());
    println!("  chunks written: {}", chunks);
    if report.is_complete() {
        println!("ok");
    }
    Ok(())
}

pub async fn run_index_external(
    config: &Config,
    store: &Arc<SqliteStore>,
    dir: Option<&Path>,
    progress: ProgressMode,
) -> Result<()> {
    let root = dir.unwrap_or(&config.advice.root);
    let indexer = build_indexer(config, store)?;
    let report = index_advice(&indexer, &config.advice, root, progress).await?;

    println!("index external {}", root.display());
    for file in &report.files {
        match &file.result {
            Ok(chunks) => println!("  {}  chunks: {}", file.relative, chunks),
            Err(e) => println!("  {}  failed: {}", file.relative, e),
        }
    }
    println!("  files indexed: {}", report.indexed());
    println!("  files failed: {}", report.failed());
    println!("  chunks written: {}", report.total_chunks());
    if report.failed() == 0 {
        println!("ok");
    }
    Ok(())
}
