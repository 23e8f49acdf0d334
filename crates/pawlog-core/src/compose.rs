//! Context composition for answer generation.
//!
//! Turns [`DualResults`] into two labeled text blocks. Internal hits that
//! only say "there was nothing" (no records, zero grams, could not be
//! evaluated) are dropped unless they are long enough to carry other
//! content too.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::search::DualResults;
use crate::store::ScoredChunk;

pub const NO_INTERNAL: &str = "No relevant internal data found.";
pub const NO_EXTERNAL: &str = "No relevant external advice found.";

/// Content longer than this is kept even when it matches a low-information
/// pattern.
const LOW_INFO_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedContext {
    pub internal: String,
    pub external: String,
}

fn low_info_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"(?i)no (records?|data|logs?|walk|sleep|meal)",
            r"(?i)\b0\s*(g|minutes?|hours?|km)\b",
            r"(?i)insufficient|could not be evaluated|could not be assessed",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    })
}

pub fn is_low_information(content: &str) -> bool {
    content.chars().count() <= LOW_INFO_MAX_CHARS
        && low_info_patterns().iter().any(|re| re.is_match(content))
}

pub fn compose(results: &DualResults) -> ComposedContext {
    let internal: Vec<&ScoredChunk> = results
        .internal
        .iter()
        .filter(|c| !is_low_information(&c.content))
        .collect();
    let external: Vec<&ScoredChunk> = results.external.iter().collect();

    ComposedContext {
        internal: label_block(&internal, "Internal Context", NO_INTERNAL),
        external: label_block(&external, "External Advice", NO_EXTERNAL),
    }
}

fn label_block(chunks: &[&ScoredChunk], label: &str, empty: &str) -> String {
    if chunks.is_empty() {
        return empty.to_string();
    }
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{} {}]\n{}", label, i + 1, c.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn hit(content: &str) -> ScoredChunk {
        ScoredChunk {
            document_id: "d".into(),
            content: content.into(),
            metadata: Value::Null,
            score: 0.5,
        }
    }

    #[test]
    fn low_information_patterns() {
        assert!(is_low_information("No records were found for Bori."));
        assert!(is_low_information("She ate 0 g this week"));
        assert!(is_low_information("Sleep could not be evaluated."));
        assert!(is_low_information("NO WALK today"));
        assert!(!is_low_information("Walked 30 minutes in the park"));
        assert!(!is_low_information("Ate 10 g of treats"));
    }

    #[test]
    fn long_content_is_kept() {
        let long = format!("No records of walks. {}", "Ate well and slept soundly. ".repeat(10));
        assert!(long.chars().count() > 200);
        assert!(!is_low_information(&long));
    }

    #[test]
    fn composes_labels_and_filters_internal() {
        let results = DualResults {
            internal: vec![hit("no data"), hit("Ate 120 g daily"), hit("Barked twice")],
            external: vec![hit("no data on puppies is fine")],
        };
        let ctx = compose(&results);
        assert_eq!(
            ctx.internal,
            "[Internal Context 1]\nAte 120 g daily\n\n[Internal Context 2]\nBarked twice"
        );
        assert_eq!(ctx.external, "[External Advice 1]\nno data on puppies is fine");
    }

    #[test]
    fn empty_sides_use_sentinels() {
        let results = DualResults {
            internal: vec![hit("No records were found.")],
            external: vec![],
        };
        let ctx = compose(&results);
        assert_eq!(ctx.internal, NO_INTERNAL);
        assert_eq!(ctx.external, NO_EXTERNAL);
    }
}
