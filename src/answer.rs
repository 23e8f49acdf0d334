//! OpenAI-compatible chat answer generator.
//!
//! Sends the system and user prompts built by `pawlog_core::answer` to a
//! chat completions endpoint and returns `choices[0].message.content`.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use pawlog_core::answer::{system_prompt, user_prompt, AnswerGenerator, AnswerRequest};
use pawlog_core::error::Error;

use crate::config::AnswerConfig;
use crate::embedding::post_json_with_retry;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const EMPTY_ANSWER: &str = "Sorry, I couldn't generate an answer.";
const CHAT_RETRIES: u32 = 2;

pub struct OpenAIChatGenerator {
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: String,
    url: String,
    client: reqwest::Client,
}

impl OpenAIChatGenerator {
    pub fn new(config: &AnswerConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_CHAT_URL.to_string()),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
        })
    }

    fn request_body(&self, request: &AnswerRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(&request.subject_label) },
                { "role": "user", "content": user_prompt(request) },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        })
    }
}

fn parse_chat_response(json: &serde_json::Value) -> String {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(EMPTY_ANSWER)
        .to_string()
}

#[async_trait]
impl AnswerGenerator for OpenAIChatGenerator {
    async fn generate(&self, request: &AnswerRequest) -> Result<String> {
        let json = post_json_with_retry(
            &self.client,
            &self.url,
            Some(&self.api_key),
            &self.request_body(request),
            CHAT_RETRIES,
            "Chat API",
        )
        .await?;
        Ok(parse_chat_response(&json))
    }
}

/// Build the configured answer generator.
///
/// Returns `None` when answering is disabled, or when the OpenAI key is
/// missing, in which case a warning is logged and `ask` falls back to
/// returning the retrieved context.
pub fn create_generator(config: &AnswerConfig) -> Result<Option<Arc<dyn AnswerGenerator>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                Ok(Some(Arc::new(OpenAIChatGenerator::new(config, key)?)))
            }
            _ => {
                tracing::warn!("OPENAI_API_KEY not set; answers will contain retrieved context only");
                Ok(None)
            }
        },
        other => Err(Error::configuration(format!(
            "Unknown answer provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> OpenAIChatGenerator {
        OpenAIChatGenerator::new(&AnswerConfig::default(), "sk-test".into()).unwrap()
    }

    #[test]
    fn request_body_matches_chat_contract() {
        let body = generator().request_body(&AnswerRequest {
            question: "Is she sleeping enough?".into(),
            subject_label: "Bori".into(),
            internal_context: "ctx".into(),
            external_context: "adv".into(),
        });
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .starts_with("Question: Is she sleeping enough?"));
    }

    #[test]
    fn missing_content_falls_back() {
        assert_eq!(parse_chat_response(&serde_json::json!({})), EMPTY_ANSWER);
        let json = serde_json::json!({
            "choices": [{ "message": { "content": " Walk her twice a day. " } }]
        });
        assert_eq!(parse_chat_response(&json), "Walk her twice a day.");
    }

    #[test]
    fn disabled_yields_no_generator() {
        assert!(create_generator(&AnswerConfig::default()).unwrap().is_none());
    }
}
