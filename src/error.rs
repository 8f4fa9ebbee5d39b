//! Error types for quiz generation and bot startup
//!
//! Only [`ParseError`] and [`UpstreamError`] ever leave the generation
//! pipeline, and both are absorbed by the orchestration layer, which swaps in
//! a fallback quiz and records the reason.

use crate::quiz::ai_helper::ModelChoice;

/// The model output could not be read as structured data at all
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid YAML in model output: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON in model output: {0}")]
    Json(#[from] serde_json::Error),
}

/// The completion call itself failed
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("no API key configured for {model}")]
    MissingApiKey { model: ModelChoice },

    #[error("completion request failed: {0}")]
    Client(#[from] chatgpt::err::Error),

    #[error("invalid completion endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Why a generated quiz was replaced with the fallback one
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("upstream call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("could not parse model output: {0}")]
    Parse(#[from] ParseError),

    #[error("model output contained no questions")]
    EmptyQuiz,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            value: value.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("io error reading knowledge base: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed knowledge base: {0}")]
    Format(#[from] serde_yaml::Error),

    #[error("duplicate concept id: {0}")]
    DuplicateId(String),

    #[error("knowledge base contains no concepts")]
    Empty,
}
