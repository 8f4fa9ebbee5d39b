use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::quiz::ai_helper::ModelChoice;
use crate::quiz::normalize::ResponseFormat;

#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub kimi: Option<String>,
    pub gemini: Option<String>,
}

impl ApiKeys {
    pub fn for_model(&self, model: ModelChoice) -> Option<&str> {
        match model {
            ModelChoice::Kimi => self.kimi.as_deref(),
            ModelChoice::Gemini => self.gemini.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_keys: ApiKeys,
    pub default_model: ModelChoice,
    pub response_format: ResponseFormat,
    pub temperature: f32,
    pub timeout: Duration,
    pub knowledge_file: PathBuf,
    pub dialogue_db: String,
    /// Show generation reports to the user
    pub debug: bool,
}

impl Settings {
    /// Reads settings from the process environment (call `dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            api_keys: ApiKeys {
                kimi: var("KIMI_API_KEY"),
                gemini: var("GOOGLE_API_KEY"),
            },
            default_model: parse_or(var("QUIZ_DEFAULT_MODEL"), ModelChoice::default())?,
            response_format: parse_or(var("QUIZ_RESPONSE_FORMAT"), ResponseFormat::default())?,
            temperature: parse_number(var("QUIZ_TEMPERATURE"), "QUIZ_TEMPERATURE", 0.3)?,
            timeout: Duration::from_secs(parse_number(
                var("QUIZ_TIMEOUT_SECS"),
                "QUIZ_TIMEOUT_SECS",
                30,
            )?),
            knowledge_file: var("KNOWLEDGE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/concepts.yaml")),
            dialogue_db: var("DIALOGUE_DB").unwrap_or_else(|| "db.sqlite".to_string()),
            debug: parse_flag(var("QUIZ_DEBUG"))?,
        })
    }
}

fn parse_or<T>(value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = ConfigError>,
{
    value.map_or(Ok(default), |v| v.parse())
}

fn parse_number<T: FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::invalid(key, v)),
        None => Ok(default),
    }
}

fn parse_flag(value: Option<String>) -> Result<bool, ConfigError> {
    let Some(v) = value else {
        return Ok(false);
    };
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid("QUIZ_DEBUG", v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.default_model, ModelChoice::Kimi);
        assert_eq!(settings.response_format, ResponseFormat::Yaml);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.knowledge_file, PathBuf::from("data/concepts.yaml"));
        assert!(!settings.debug);
        assert!(settings.api_keys.for_model(ModelChoice::Kimi).is_none());
    }

    #[test]
    fn reads_overrides() {
        let settings = settings(&[
            ("GOOGLE_API_KEY", "g-key"),
            ("KIMI_API_KEY", "  "),
            ("QUIZ_DEFAULT_MODEL", "gemini"),
            ("QUIZ_RESPONSE_FORMAT", "json"),
            ("QUIZ_TEMPERATURE", "0.7"),
            ("QUIZ_TIMEOUT_SECS", "5"),
            ("QUIZ_DEBUG", "yes"),
        ])
        .unwrap();
        assert_eq!(settings.api_keys.for_model(ModelChoice::Gemini), Some("g-key"));
        assert_eq!(settings.api_keys.for_model(ModelChoice::Kimi), None);
        assert_eq!(settings.default_model, ModelChoice::Gemini);
        assert_eq!(settings.response_format, ResponseFormat::Json);
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert!(settings.debug);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(settings(&[("QUIZ_TIMEOUT_SECS", "soon")]).is_err());
        assert!(settings(&[("QUIZ_DEBUG", "maybe")]).is_err());
        assert!(settings(&[("QUIZ_DEFAULT_MODEL", "gpt")]).is_err());
    }
}
