use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use pawlog_core::chunk::ChunkOptions;
use pawlog_core::search::SearchLimits;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub advice: AdviceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn options(&self) -> ChunkOptions {
        ChunkOptions {
            max_chars: self.max_chars,
            overlap: self.overlap_chars,
        }
    }
}

fn default_max_chars() -> usize {
    800
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k_internal: usize,
    #[serde(default = "default_top_k")]
    pub top_k_external: usize,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_internal: default_top_k(),
            top_k_external: default_top_k(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl RetrievalConfig {
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            top_k_internal: self.top_k_internal,
            top_k_external: self.top_k_external,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_lookback_days() -> u32 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (Ollama host, or an OpenAI-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_answer_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_answer_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_answer_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdviceConfig {
    #[serde(default = "default_advice_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            root: default_advice_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_advice_root() -> PathBuf {
    PathBuf::from("./data/documents")
}

fn default_include_globs() -> Vec<String> {
    ["**/*.md", "**/*.txt", "**/*.mdx", "**/*.tsx", "**/*.ts"]
        .iter()
        .map(|g| g.to_string())
        .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    // Validate retrieval
    if config.retrieval.top_k_internal < 1 || config.retrieval.top_k_external < 1 {
        anyhow::bail!("retrieval.top_k_internal and retrieval.top_k_external must be >= 1");
    }
    if config.retrieval.lookback_days < 1 {
        anyhow::bail!("retrieval.lookback_days must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() && config.embedding.provider != "hashing" {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "hashing" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, hashing, or local.",
            other
        ),
    }

    match config.answer.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown answer provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.answer.temperature) {
        anyhow::bail!("answer.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"./data/pawlog.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.max_chars, 800);
        assert_eq!(config.chunking.overlap_chars, 100);
        assert_eq!(config.retrieval.top_k_internal, 5);
        assert_eq!(config.retrieval.lookback_days, 30);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.answer.model, "gpt-4o-mini");
        assert_eq!(config.server.bind, "127.0.0.1:7341");
        assert_eq!(config.advice.include_globs.len(), 5);
    }

    #[test]
    fn overlap_must_be_smaller_than_max() {
        let err = parse(
            "[db]\npath = \"x\"\n[chunking]\nmax_chars = 100\noverlap_chars = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn enabled_embedding_requires_dims() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn hashing_needs_no_model() {
        let config =
            parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"hashing\"\ndims = 64\n").unwrap();
        assert!(config.embedding.is_enabled());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\ndims = 8\nmodel = \"m\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse(include_str!("../config/pawlog.example.toml")).unwrap();
        assert_eq!(config.embedding.dims, Some(1024));
        assert_eq!(config.answer.provider, "openai");
    }
}
