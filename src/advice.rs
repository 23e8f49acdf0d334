//! External advice corpus: scan, extract, index.
//!
//! Walks the advice root with include/exclude globs, turns each file into
//! plain text, and indexes it as an `external_advice:{path}` document.
//! One file failing (unreadable, or nothing left after extraction) is
//! recorded and the rest continue.
//!
//! | Extension | Extraction |
//! |-----------|------------|
//! | `.tsx`, `.ts` | strip imports, JSX tags, declarations, and braces; collapse whitespace |
//! | anything else | normalize line breaks, collapse 3+ blank lines, trim |

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use pawlog_core::indexer::DocumentIndexer;
use pawlog_core::models::DocumentSpec;

use crate::config::AdviceConfig;
use crate::progress::{Progress, ProgressMode};

/// One file selected for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceFile {
    pub path: PathBuf,
    /// Path relative to the advice root, `/`-separated.
    pub relative: String,
    pub file_name: String,
}

pub fn scan_advice(config: &AdviceConfig, root: &Path) -> Result<Vec<AdviceFile>> {
    if !root.exists() {
        bail!("Advice root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(AdviceFile {
            path: path.to_path_buf(),
            file_name: entry.file_name().to_string_lossy().to_string(),
            relative: rel_str,
        });
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn regex(slot: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    slot.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Strip source-code scaffolding from a `.tsx`/`.ts` advice page, keeping
/// the prose.
pub fn extract_from_tsx(content: &str) -> String {
    static IMPORTS: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static EXPORTS: OnceLock<Regex> = OnceLock::new();
    static DECLS: OnceLock<Regex> = OnceLock::new();
    static BRACES: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();

    let text = regex(&IMPORTS, r#"(?m)^import\s+.*?from\s+['"].*?['"];?\s*$"#)
        .replace_all(content, "");
    let text = regex(&TAGS, r"<[^>]+>").replace_all(&text, " ");
    let text = regex(&EXPORTS, r"(?m)^export\s+(default\s+)?(function|const|class)\s+.*?\{")
        .replace_all(&text, "");
    let text = regex(&DECLS, r"(?m)^(function|const|let|var)\s+\w+\s*[=:].*?\{")
        .replace_all(&text, "");
    let text = regex(&BRACES, r"[{}\[\]]").replace_all(&text, " ");
    regex(&SPACE, r"\s+").replace_all(&text, " ").trim().to_string()
}

pub fn extract_from_plain(content: &str) -> String {
    static BLANKS: OnceLock<Regex> = OnceLock::new();
    let text = content.replace("\r\n", "\n").replace('\r', "\n");
    regex(&BLANKS, r"\n{3,}")
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

pub fn extract_text(file_name: &str, content: &str) -> String {
    let ext = file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match ext.as_str() {
        "tsx" | "ts" => extract_from_tsx(content),
        _ => extract_from_plain(content),
    }
}

/// Topic keyword from a file name such as `puppy-feeding.md`.
pub fn infer_topic(file_name: &str) -> Option<String> {
    static EXT: OnceLock<Regex> = OnceLock::new();
    static TOPIC: OnceLock<Regex> = OnceLock::new();
    let stem = regex(&EXT, r"(?i)\.(tsx|ts|md|txt)$").replace(file_name, "");
    regex(
        &TOPIC,
        r"(?i)(?:^|[-_])(health|feeding|training|exercise|behavior|grooming|care|nutrition|safety)",
    )
    .captures(&stem)
    .map(|c| c[1].to_lowercase())
}

/// Outcome for one advice file.
#[derive(Debug)]
pub struct FileOutcome {
    pub relative: String,
    pub result: Result<usize>,
}

#[derive(Debug, Default)]
pub struct AdviceReport {
    pub files: Vec<FileOutcome>,
}

impl AdviceReport {
    pub fn indexed(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.indexed()
    }

    pub fn total_chunks(&self) -> usize {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().ok())
            .sum()
    }
}

async fn index_file(indexer: &DocumentIndexer, file: &AdviceFile) -> Result<usize> {
    let content = tokio::fs::read_to_string(&file.path).await?;
    let text = extract_text(&file.file_name, &content);
    if text.is_empty() {
        bail!("no text content extracted from {}", file.file_name);
    }
    let topic = infer_topic(&file.file_name);
    let doc = DocumentSpec::external_advice(&file.relative, &file.file_name, topic.as_deref());
    Ok(indexer.index(&doc, &text).await?.chunks)
}

/// Index every advice file under `root`.
pub async fn index_advice(
    indexer: &DocumentIndexer,
    config: &AdviceConfig,
    root: &Path,
    progress: ProgressMode,
) -> Result<AdviceReport> {
    let files = scan_advice(config, root)?;
    indexer.prepare().await?;

    let task = "index external";
    let total = files.len() as u64;
    progress.report(Progress {
        task,
        done: 0,
        total,
    });

    let mut report = AdviceReport::default();
    for (i, file) in files.iter().enumerate() {
        let result = index_file(indexer, file).await;
        if let Err(e) = &result {
            tracing::warn!(
                file = %file.relative,
                error = %e,
                "advice file not indexed"
            );
        }
        progress.report(Progress {
            task,
            done: i as u64 + 1,
            total,
        });
        report.files.push(FileOutcome {
            relative: file.relative.clone(),
            result,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsx_keeps_prose() {
        let src = r#"import React from 'react';
import { Card } from "../ui/card";

export default function FeedingGuide() {
  return (
    <Card className="p-4">
      <h1>Feeding basics</h1>
      <p>Feed adult dogs twice a day.</p>
    </Card>
  );
}
"#;
        let text = extract_from_tsx(src);
        assert!(!text.contains("import"));
        assert!(!text.contains('<'));
        assert!(!text.contains('{'));
        assert!(text.contains("Feeding basics Feed adult dogs twice a day."));
    }

    #[test]
    fn plain_text_normalization() {
        let text = extract_from_plain("  Title\r\n\r\n\r\n\r\nBody\rline  \n");
        assert_eq!(text, "Title\n\nBody\nline");
    }

    #[test]
    fn extension_selects_extractor() {
        assert_eq!(extract_text("a.md", "x\n\n\n\ny"), "x\n\ny");
        assert_eq!(extract_text("a.TSX", "<p>x</p>\n\ny"), "x y");
    }

    #[test]
    fn topic_from_file_name() {
        assert_eq!(infer_topic("puppy-feeding.md").as_deref(), Some("feeding"));
        assert_eq!(infer_topic("Health_tips.txt").as_deref(), Some("health"));
        assert_eq!(infer_topic("grooming.tsx").as_deref(), Some("grooming"));
        assert_eq!(infer_topic("misc.md"), None);
        // keyword must start the name or follow a separator
        assert_eq!(infer_topic("selfcare.md"), None);
    }

    #[test]
    fn scan_applies_globs() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("feeding.md"), "feed").unwrap();
        std::fs::write(dir.path().join("nested/health.txt"), "vet").unwrap();
        std::fs::write(dir.path().join("image.png"), "bin").unwrap();
        std::fs::write(dir.path().join("draft.md"), "wip").unwrap();

        let config = AdviceConfig {
            root: dir.path().to_path_buf(),
            exclude_globs: vec!["draft.md".into()],
            ..AdviceConfig::default()
        };
        let files = scan_advice(&config, dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["feeding.md", "nested/health.txt"]);
    }
}
