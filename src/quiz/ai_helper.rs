use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chatgpt::{client::ChatGPT, config::ChatGPTEngine, types::CompletionResponse};
use log::{debug, info, warn};
use url::Url;

use crate::config::{ApiKeys, Settings};
use crate::error::{ConfigError, GenerationError, UpstreamError};
use crate::knowledge::ConceptNode;
use crate::quiz::fallback::fallback_quiz;
use crate::quiz::normalize::{normalize_response, ResponseFormat};
use crate::quiz::prompt::build_quiz_prompt;
use crate::quiz::question_count::desired_question_count;
use crate::quiz::{QuizData, QuizQuestion};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Kimi,
    Gemini,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 2] = [ModelChoice::Kimi, ModelChoice::Gemini];

    pub fn model_name(&self) -> &'static str {
        match self {
            ModelChoice::Kimi => "kimi-k2-0711-preview",
            ModelChoice::Gemini => "gemini-2.5-flash",
        }
    }

    /// OpenAI-compatible chat completions endpoint
    pub fn endpoint(&self) -> &'static str {
        match self {
            ModelChoice::Kimi => "https://api.moonshot.cn/v1/chat/completions",
            ModelChoice::Gemini => {
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelChoice::Kimi => "Kimi (Moonshot AI)",
            ModelChoice::Gemini => "Gemini (Google)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.label() == label.trim())
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelChoice::Kimi => "kimi",
            ModelChoice::Gemini => "gemini",
        })
    }
}

impl FromStr for ModelChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kimi" | "moonshot" => Ok(ModelChoice::Kimi),
            "gemini" | "google" => Ok(ModelChoice::Gemini),
            _ => Err(ConfigError::invalid("QUIZ_DEFAULT_MODEL", s)),
        }
    }
}

/// Sends one prompt to a chat model and returns its text reply
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        model: ModelChoice,
        prompt: &str,
    ) -> Result<String, UpstreamError>;
}

/// Talks to OpenAI-compatible endpoints through `chatgpt_rs`. A client is
/// built per call from the requested model, so no selection state is kept.
pub struct ChatGptBackend {
    keys: ApiKeys,
    temperature: f32,
    timeout: Duration,
}

impl ChatGptBackend {
    pub fn new(keys: ApiKeys, temperature: f32, timeout: Duration) -> Self {
        Self {
            keys,
            temperature,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.api_keys.clone(),
            settings.temperature,
            settings.timeout,
        )
    }

    fn client(&self, model: ModelChoice) -> Result<ChatGPT, UpstreamError> {
        let key = self
            .keys
            .for_model(model)
            .ok_or(UpstreamError::MissingApiKey { model })?;

        let mut gpt = ChatGPT::new(key)?;
        gpt.config.engine = ChatGPTEngine::Custom(model.model_name());
        gpt.config.temperature = self.temperature;
        gpt.config.timeout = self.timeout;
        gpt.config.api_url = Url::parse(model.endpoint())?;

        Ok(gpt)
    }
}

#[async_trait]
impl CompletionBackend for ChatGptBackend {
    async fn complete(
        &self,
        model: ModelChoice,
        prompt: &str,
    ) -> Result<String, UpstreamError> {
        let gpt = self.client(model)?;
        let response: CompletionResponse = gpt.send_message(prompt).await?;
        Ok(response.message().clone().content)
    }
}

/// Per-call generation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuizRequest {
    pub model: ModelChoice,
    pub format: ResponseFormat,
}

/// What happened during one generation, for the optional debug output
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub concept_id: String,
    pub model: ModelChoice,
    pub question_count: usize,
    pub elapsed: Duration,
    pub fallback_reason: Option<String>,
}

impl GenerationReport {
    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "concept: {}\nmodel: {} ({})\nrequested questions: {}\nresponse time: {} ms",
            self.concept_id,
            self.model,
            self.model.model_name(),
            self.question_count,
            self.elapsed.as_millis(),
        );
        if let Some(reason) = &self.fallback_reason {
            summary.push_str(&format!("\nfallback used: {reason}"));
        }
        summary
    }
}

#[derive(Debug, Clone)]
pub struct QuizOutcome {
    pub quiz: QuizData,
    pub report: GenerationReport,
}

pub struct QuizHelper {
    backend: Arc<dyn CompletionBackend>,
}

impl QuizHelper {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Generates a quiz for `concept`, substituting the fallback quiz on any
    /// failure. Always returns something the bot can show.
    pub async fn generate_quiz(&self, concept: &ConceptNode, request: &QuizRequest) -> QuizOutcome {
        let question_count = desired_question_count(&concept.content, concept.examples.len());
        info!(
            "Generating {} questions for '{}' with {}",
            question_count, concept.id, request.model
        );

        let started = Instant::now();
        let result = self.try_generate(concept, question_count, request).await;
        let elapsed = started.elapsed();

        let (quiz, fallback_reason) = match result {
            Ok(quiz) => {
                info!(
                    "{} answered in {} ms with {} questions",
                    request.model,
                    elapsed.as_millis(),
                    quiz.questions.len()
                );
                (quiz, None)
            }
            Err(err) => {
                warn!("Using fallback quiz for '{}': {}", concept.id, err);
                let quiz = fallback_quiz(
                    &concept.title,
                    &concept.description,
                    concept.level,
                    &concept.category,
                );
                (quiz, Some(err.to_string()))
            }
        };

        QuizOutcome {
            quiz,
            report: GenerationReport {
                concept_id: concept.id.clone(),
                model: request.model,
                question_count,
                elapsed,
                fallback_reason,
            },
        }
    }

    async fn try_generate(
        &self,
        concept: &ConceptNode,
        question_count: usize,
        request: &QuizRequest,
    ) -> Result<QuizData, GenerationError> {
        let prompt = build_quiz_prompt(concept, question_count, request.format);
        let raw = self.backend.complete(request.model, &prompt).await?;
        debug!("Completion: {:?}", raw);

        let mut quiz = normalize_response(&raw, request.format, question_count)?;
        quiz.questions.retain(QuizQuestion::is_answerable);
        if quiz.is_empty() {
            return Err(GenerationError::EmptyQuiz);
        }
        Ok(quiz)
    }
}
