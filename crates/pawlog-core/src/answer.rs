//! Question answering over retrieved context.
//!
//! [`ask`] runs the retrieval pipeline end to end: dual search, context
//! composition, then an [`AnswerGenerator`]. Without a generator the
//! pipeline still answers, returning the retrieved context itself so the
//! caller always gets a non-empty response.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::compose::{compose, ComposedContext};
use crate::embedding::EmbeddingProvider;
use crate::error::Error;
use crate::models::Subject;
use crate::search::{search_both, DualResults, SearchLimits};
use crate::store::{IndexStore, ScoredChunk};

/// Characters of each context block kept in a degraded answer.
const DEGRADED_CONTEXT_CHARS: usize = 500;
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRequest {
    pub question: String,
    pub subject_label: String,
    pub internal_context: String,
    pub external_context: String,
}

/// A language model that turns a question plus context into an answer.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, request: &AnswerRequest) -> Result<String>;
}

pub fn system_prompt(subject_label: &str) -> String {
    format!(
        "You are a helpful assistant providing advice about dog care and health.\n\
         You have access to two types of information:\n\
         1. Internal data: Specific information about {name}'s recent activities, health records, and weekly summaries.\n\
         2. External advice: General dog care advice and best practices.\n\
         \n\
         When answering questions, use both sources of information. Reference the internal data for specific information about {name}, and use external advice for general guidance and best practices.\n\
         \n\
         Answer in English unless the user explicitly asks in another language.",
        name = subject_label
    )
}

pub fn user_prompt(request: &AnswerRequest) -> String {
    format!(
        "Question: {q}\n\n\
         === Internal Data ({name}'s Recent State) ===\n{internal}\n\n\
         === External Advice (General Dog Care) ===\n{external}\n\n\
         Please provide a helpful answer in English based on both the internal data about {name} and the external advice.",
        q = request.question,
        name = request.subject_label,
        internal = request.internal_context,
        external = request.external_context
    )
}

/// The answer returned when no generator is configured.
pub fn degraded_answer(context: &ComposedContext) -> String {
    format!(
        "LLM API is not configured. The following contexts were retrieved:\n\n\
         [Internal Data]\n{}\n\n[External Advice]\n{}",
        truncate_chars(&context.internal, DEGRADED_CONTEXT_CHARS),
        truncate_chars(&context.external, DEGRADED_CONTEXT_CHARS)
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// A shortened view of one retrieved chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPreview {
    pub content: String,
    pub score: f64,
    pub metadata: Value,
}

impl ContextPreview {
    pub fn of(chunk: &ScoredChunk) -> Self {
        let head = truncate_chars(&chunk.content, PREVIEW_CHARS);
        let content = if head.len() < chunk.content.len() {
            format!("{}...", head)
        } else {
            head.to_string()
        };
        Self {
            content,
            score: chunk.score,
            metadata: chunk.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub answer: String,
    /// True when the answer is the raw context because no generator was set.
    pub degraded: bool,
    pub results: DualResults,
    pub context: ComposedContext,
}

pub async fn ask(
    store: &dyn IndexStore,
    provider: &dyn EmbeddingProvider,
    generator: Option<&dyn AnswerGenerator>,
    subject: &Subject,
    question: &str,
    limits: SearchLimits,
) -> Result<AskOutcome> {
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::validation("question must not be empty"));
    }

    let results = search_both(store, provider, question, subject.id, limits).await?;
    let context = compose(&results);

    let (answer, degraded) = match generator {
        Some(generator) => {
            let request = AnswerRequest {
                question: question.to_string(),
                subject_label: subject.name.clone(),
                internal_context: context.internal.clone(),
                external_context: context.external.clone(),
            };
            (generator.generate(&request).await?, false)
        }
        None => (degraded_answer(&context), true),
    };

    Ok(AskOutcome {
        answer,
        degraded,
        results,
        context,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::compose::{NO_EXTERNAL, NO_INTERNAL};
    use crate::embedding::HashingProvider;
    use crate::store::memory::InMemoryStore;

    struct Echo {
        seen: Mutex<Option<AnswerRequest>>,
    }

    #[async_trait]
    impl AnswerGenerator for Echo {
        async fn generate(&self, request: &AnswerRequest) -> Result<String> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(format!("answer for {}", request.subject_label))
        }
    }

    fn bori() -> Subject {
        Subject {
            id: 1,
            name: "Bori".into(),
        }
    }

    #[test]
    fn prompts_name_the_subject() {
        let request = AnswerRequest {
            question: "Is she eating enough?".into(),
            subject_label: "Bori".into(),
            internal_context: "[Internal Context 1]\nate 100 g".into(),
            external_context: NO_EXTERNAL.into(),
        };
        assert!(system_prompt("Bori").contains("information about Bori's recent activities"));
        let user = user_prompt(&request);
        assert!(user.starts_with("Question: Is she eating enough?\n\n=== Internal Data (Bori's Recent State) ==="));
        assert!(user.contains("=== External Advice (General Dog Care) ===\nNo relevant external advice found."));
    }

    #[test]
    fn degraded_answer_truncates_blocks() {
        let ctx = ComposedContext {
            internal: "i".repeat(900),
            external: "short".into(),
        };
        let answer = degraded_answer(&ctx);
        assert!(answer.starts_with("LLM API is not configured."));
        assert!(answer.contains(&format!("[Internal Data]\n{}\n\n[External Advice]\nshort", "i".repeat(500))));
        assert!(!answer.contains(&"i".repeat(501)));
    }

    #[test]
    fn preview_marks_truncation() {
        let chunk = ScoredChunk {
            document_id: "d".into(),
            content: "x".repeat(250),
            metadata: Value::Null,
            score: 0.9,
        };
        assert_eq!(ContextPreview::of(&chunk).content, format!("{}...", "x".repeat(200)));
        let short = ScoredChunk {
            content: "fine".into(),
            ..chunk
        };
        assert_eq!(ContextPreview::of(&short).content, "fine");
    }

    #[tokio::test]
    async fn ask_without_generator_is_degraded() {
        let store = InMemoryStore::new();
        let outcome = ask(&store, &HashingProvider::new(16), None, &bori(), "walks?", SearchLimits::default())
            .await
            .unwrap();
        assert!(outcome.degraded);
        assert!(outcome.answer.contains(NO_INTERNAL));
        assert!(outcome.answer.contains(NO_EXTERNAL));
    }

    #[tokio::test]
    async fn ask_passes_composed_context() {
        let store = InMemoryStore::new();
        let echo = Echo { seen: Mutex::new(None) };
        let outcome = ask(
            &store,
            &HashingProvider::new(16),
            Some(&echo),
            &bori(),
            " how is she? ",
            SearchLimits::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.answer, "answer for Bori");
        assert!(!outcome.degraded);
        let seen = echo.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.question, "how is she?");
        assert_eq!(seen.internal_context, NO_INTERNAL);
    }

    #[tokio::test]
    async fn empty_question_is_validation_error() {
        let store = InMemoryStore::new();
        let err = ask(&store, &HashingProvider::new(16), None, &bori(), "", SearchLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(crate::error::classify(&err), Some(Error::Validation(_))));
    }
}
