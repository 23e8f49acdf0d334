//! Sentence-boundary text chunker with overlap.
//!
//! Splits text into pieces of at most `max_chars` characters (Unicode
//! scalar values), preferring to end each piece just after a `.` or a
//! newline, and starting each following piece `overlap` characters
//! before the previous end so context carries across the boundary.
//!
//! # Algorithm
//!
//! 1. Text that fits in one chunk is returned whole.
//! 2. From `start`, propose `end = start + max_chars`.
//! 3. If `end` is short of the text end, search backward inside
//!    `(start, end)` for the nearest `.` or `\n` and snap `end` just past it.
//! 4. Emit the trimmed slice `[start, end)`; stop if `end` reached the text end.
//! 5. Continue from `end - overlap`, or from `end` when that would not advance.
//!
//! Single pass, greedy, no rebalancing. Blank pieces are dropped.
//!
//! # Example
//!
//! ```rust
//! use pawlog_core::chunk::{chunk_text, ChunkOptions};
//!
//! let chunks = chunk_text(&"a".repeat(50), &ChunkOptions::default());
//! assert_eq!(chunks, vec!["a".repeat(50)]);
//! ```

use serde_json::{Map, Value};

/// Chunk sizing, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chars: 800,
            overlap: 100,
        }
    }
}

/// One chunk with its position and metadata, ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub chunk_index: usize,
    pub content: String,
    pub metadata: Map<String, Value>,
}

pub fn chunk_text(text: &str, opts: &ChunkOptions) -> Vec<String> {
    let max = opts.max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= max {
        if text.trim().is_empty() {
            return Vec::new();
        }
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let mut end = (start + max).min(len);
        if end < len {
            if let Some(pos) = (start + 1..end)
                .rev()
                .find(|&i| chars[i] == '.' || chars[i] == '\n')
            {
                end = pos + 1;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= len {
            break;
        }
        let next = end.saturating_sub(opts.overlap);
        start = if next > start { next } else { end };
    }
    chunks
}

/// Chunk `text` and attach `base` metadata plus `chunkIndex` and
/// `totalChunks` to every piece.
pub fn chunk_with_metadata(
    text: &str,
    opts: &ChunkOptions,
    base: &Map<String, Value>,
) -> Vec<ChunkDraft> {
    let pieces = chunk_text(text, opts);
    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let mut metadata = base.clone();
            metadata.insert("chunkIndex".into(), Value::from(i));
            metadata.insert("totalChunks".into(), Value::from(total));
            ChunkDraft {
                chunk_index: i,
                content,
                metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(max_chars: usize, overlap: usize) -> ChunkOptions {
        ChunkOptions { max_chars, overlap }
    }

    #[test]
    fn short_text_is_single_chunk() {
        let text = "a".repeat(50);
        assert_eq!(chunk_text(&text, &ChunkOptions::default()), vec![text]);
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(chunk_text("", &ChunkOptions::default()).is_empty());
        assert!(chunk_text("   \n\n  ", &ChunkOptions::default()).is_empty());
    }

    #[test]
    fn long_text_respects_max_and_overlaps() {
        let text: String = (0..200).map(|i| format!("word{} ", i)).collect();
        let chunks = chunk_text(&text, &opts(100, 20));

        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 100, "chunk too long: {}", c.len());
        }
        for pair in chunks.windows(2) {
            let head: String = pair[1].chars().take(10).collect();
            assert!(
                pair[0].contains(&head),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
        assert!(chunks.last().unwrap().ends_with("word199"));
    }

    #[test]
    fn snaps_to_sentence_end() {
        let text = format!("{}. {}", "x".repeat(60), "y".repeat(60));
        let chunks = chunk_text(&text, &opts(100, 10));
        assert_eq!(chunks[0], format!("{}.", "x".repeat(60)));
        assert!(chunks[1].ends_with(&"y".repeat(60)));
    }

    #[test]
    fn snaps_to_newline() {
        let text = format!("{}\n{}", "p".repeat(70), "q".repeat(70));
        let chunks = chunk_text(&text, &opts(100, 0));
        assert_eq!(chunks, vec!["p".repeat(70), "q".repeat(70)]);
    }

    #[test]
    fn unbreakable_run_is_hard_split() {
        let text = "z".repeat(250);
        let chunks = chunk_text(&text, &opts(100, 20));
        assert_eq!(chunks[0].len(), 100);
        assert!(chunks.iter().all(|c| c.len() <= 100));
        let joined_len: usize = chunks.iter().map(|c| c.len()).sum();
        assert!(joined_len >= 250);
    }

    #[test]
    fn always_advances_when_break_is_near_start() {
        // A period right after start would make `end - overlap` step backwards.
        let text = format!("a.{}", "b".repeat(300));
        let chunks = chunk_text(&text, &opts(100, 50));
        assert!(!chunks.is_empty());
        assert!(chunks.last().unwrap().ends_with('b'));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "개".repeat(120);
        let chunks = chunk_text(&text, &opts(100, 10));
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn metadata_is_attached() {
        let mut base = Map::new();
        base.insert("corpus".into(), Value::from("external"));
        let text = format!("{}. {}", "x".repeat(60), "y".repeat(60));
        let drafts = chunk_with_metadata(&text, &opts(100, 10), &base);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].chunk_index, 1);
        assert_eq!(drafts[1].metadata["corpus"], "external");
        assert_eq!(drafts[0].metadata["chunkIndex"], 0);
        assert_eq!(drafts[0].metadata["totalChunks"], 2);
    }
}
