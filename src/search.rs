//! `pawlog search` and `pawlog ask`.
//!
//! Both commands embed the query once and search the subject's internal
//! history and the shared advice corpus side by side. `ask` additionally
//! composes the hits into context blocks and runs the answer generator,
//! falling back to the raw context when no generator is configured.

use anyhow::Result;

use pawlog_core::answer::ask;
use pawlog_core::search::search_both;
use pawlog_core::store::ScoredChunk;

use crate::answer::create_generator;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteStore;
use crate::subjects::resolve_subject;

fn print_hits(label: &str, hits: &[ScoredChunk]) {
    println!("{} ({}):", label, hits.len());
    if hits.is_empty() {
        println!("  No results.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        let title = hit
            .metadata
            .get("title")
            .or_else(|| hit.metadata.get("sourceType"))
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        println!("  {}. [{:.3}] {}", i + 1, hit.score, title);
        if let (Some(start), Some(end)) = (
            hit.metadata.get("weekStart").and_then(|v| v.as_str()),
            hit.metadata.get("weekEnd").and_then(|v| v.as_str()),
        ) {
            println!("      week: {} ~ {}", start, end);
        }
        if let Some(path) = hit.metadata.get("filePath").and_then(|v| v.as_str()) {
            println!("      file: {}", path);
        }
        println!("      excerpt: \"{}\"", excerpt(&hit.content, 160));
    }
}

fn excerpt(content: &str, max: usize) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat.to_string(),
    }
}

pub async fn run_search(
    config: &Config,
    store: &SqliteStore,
    subject: &str,
    query: &str,
) -> Result<()> {
    let subject = resolve_subject(store, subject).await?;
    let provider = create_provider(&config.embedding)?;
    let results = search_both(
        store,
        provider.as_ref(),
        query,
        subject.id,
        config.retrieval.limits(),
    )
    .await?;

    print_hits("internal", &results.internal);
    println!();
    print_hits("external", &results.external);
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    store: &SqliteStore,
    subject: &str,
    question: &str,
) -> Result<()> {
    let subject = resolve_subject(store, subject).await?;
    let provider = create_provider(&config.embedding)?;
    let generator = create_generator(&config.answer)?;

    let outcome = ask(
        store,
        provider.as_ref(),
        generator.as_deref(),
        &subject,
        question,
        config.retrieval.limits(),
    )
    .await?;

    println!("{}", outcome.answer);
    println!();
    println!(
        "sources: {} internal, {} external{}",
        outcome.results.internal.len(),
        outcome.results.external.len(),
        if outcome.degraded { " (no answer model)" } else { "" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\nb", 10), "a b");
        assert_eq!(excerpt("abcdef", 3), "abc...");
    }
}
