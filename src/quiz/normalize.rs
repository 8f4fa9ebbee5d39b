//! Turns raw model output into a [`QuizData`] the bot can render without
//! further checks.
//!
//! Parsing is strict: text that is not YAML/JSON at all is a [`ParseError`].
//! Everything after parsing is lenient: every field is coerced to a safe
//! default instead of failing.

use std::str::FromStr;

use serde_json::{Map, Value};

use super::{Difficulty, QuizData, QuizQuestion};
use crate::error::{ConfigError, ParseError};

pub const DEFAULT_TITLE: &str = "AI generated quiz";
pub const DEFAULT_DESCRIPTION: &str = "Quiz generated from the concept content";

const FENCE: &str = "```";

/// Structured format the model was asked to answer in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Yaml,
    Json,
}

impl FromStr for ResponseFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(ResponseFormat::Yaml),
            "json" => Ok(ResponseFormat::Json),
            _ => Err(ConfigError::invalid("QUIZ_RESPONSE_FORMAT", s)),
        }
    }
}

/// Parses `raw` and coerces it into at most `desired_count` questions.
pub fn normalize_response(
    raw: &str,
    format: ResponseFormat,
    desired_count: usize,
) -> Result<QuizData, ParseError> {
    let body = strip_code_fences(raw);
    let tree = match format {
        ResponseFormat::Yaml => parse_yaml(body)?,
        ResponseFormat::Json => parse_json(body)?,
    };
    Ok(RawQuiz::from_value(tree).into_quiz(desired_count))
}

/// Returns the contents of the first fenced block, or the trimmed text when
/// there is none. An opening fence sits at column 0 or follows prose on the
/// same line, so code blocks nested in indented YAML scalars are left alone.
/// A fence with nothing after it is a stray trailing marker and is cut off.
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some((fence_start, body_start)) = opening_fence(text) else {
        return text;
    };
    let body = &text[body_start..];
    if body.trim().is_empty() {
        return text[..fence_start].trim();
    }
    let body_end = closing_fence(body).unwrap_or(body.len());
    body[..body_end].trim()
}

fn opening_fence(text: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end();
        if let Some(pos) = content.find(FENCE) {
            let before = &content[..pos];
            let after = &content[pos + FENCE.len()..];
            let starts_line = before.is_empty()
                || (!before.trim().is_empty() && before.ends_with(char::is_whitespace));
            if starts_line && is_language_tag(after) {
                return Some((offset + pos, offset + line.len()));
            }
        }
        offset += line.len();
    }
    None
}

fn is_language_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

fn closing_fence(body: &str) -> Option<usize> {
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Drops prose around a JSON document. Both the `{`..`}` and `[`..`]` spans
/// are tried and the longest one that parses wins, so a bracket in the prose
/// does not hide the object behind it.
fn parse_json(text: &str) -> Result<Value, ParseError> {
    let best = ['{', '[']
        .into_iter()
        .filter_map(|opener| json_span(text, opener))
        .filter_map(|span| {
            serde_json::from_str::<Value>(span)
                .ok()
                .map(|value| (span.len(), value))
        })
        .max_by_key(|(len, _)| *len);

    match best {
        Some((_, value)) => Ok(value),
        None => Ok(serde_json::from_str(text)?),
    }
}

fn json_span(text: &str, opener: char) -> Option<&str> {
    let closer = if opener == '{' { '}' } else { ']' };
    let start = text.find(opener)?;
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

fn parse_yaml(text: &str) -> Result<Value, ParseError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(yaml_to_json(yaml))
}

/// Mapping entries whose key is not a string, number or bool are skipped.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .filter_map(|(key, value)| Some((yaml_key(key)?, yaml_to_json(value))))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(u) = n.as_u64() {
        Value::from(u)
    } else if let Some(i) = n.as_i64() {
        Value::from(i)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Some(s),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        _ => None,
    }
}

/// Top level of the model output, before coercion
#[derive(Debug, Default)]
struct RawQuiz {
    title: Option<Value>,
    description: Option<Value>,
    questions: Vec<Value>,
}

/// One question entry, before coercion
#[derive(Debug, Default)]
struct RawQuestion {
    id: Option<Value>,
    question: Option<Value>,
    options: Option<Value>,
    correct_answer: Option<Value>,
    explanation: Option<Value>,
    difficulty: Option<Value>,
}

impl RawQuiz {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => Self {
                title: take(&mut map, &["title"]),
                description: take(&mut map, &["description"]),
                questions: match take(&mut map, &["questions"]) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
            },
            // A bare list is read as the question list
            Value::Array(items) => Self {
                questions: items,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    fn into_quiz(self, desired_count: usize) -> QuizData {
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| {
                RawQuestion::from_value(item).map(|raw| raw.into_question(index))
            })
            .take(desired_count)
            .collect();

        QuizData::new(
            non_empty_text(self.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            non_empty_text(self.description).unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            questions,
        )
    }
}

impl RawQuestion {
    fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        Some(Self {
            id: take(&mut map, &["id"]),
            question: take(&mut map, &["question"]),
            options: take(&mut map, &["options"]),
            correct_answer: take(&mut map, &["correctAnswer", "correct_answer", "answer"]),
            explanation: take(&mut map, &["explanation"]),
            difficulty: take(&mut map, &["difficulty"]),
        })
    }

    fn into_question(self, index: usize) -> QuizQuestion {
        let options = coerce_options(self.options);
        QuizQuestion {
            id: non_empty_text(self.id).unwrap_or_else(|| format!("ai-q-{}", index + 1)),
            question: scalar_text(self.question).unwrap_or_default(),
            correct_answer: coerce_index(self.correct_answer.as_ref(), options.len()),
            options,
            explanation: scalar_text(self.explanation).unwrap_or_default(),
            difficulty: coerce_difficulty(self.difficulty.as_ref()),
        }
    }
}

/// Removes the first present key out of `keys`; null counts as absent.
fn take(map: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| map.remove(*key))
        .find(|value| !value.is_null())
}

fn scalar_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty_text(value: Option<Value>) -> Option<String> {
    scalar_text(value).filter(|s| !s.trim().is_empty())
}

fn coerce_options(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.into_iter().map(option_text).collect(),
        _ => Vec::new(),
    }
}

/// Every item keeps its position so `correctAnswer` still points at the same option.
fn option_text(item: Value) -> String {
    match item {
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => item.to_string(),
        scalar => scalar_text(Some(scalar)).unwrap_or_default(),
    }
}

fn coerce_index(value: Option<&Value>, option_count: usize) -> usize {
    let index = match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    index
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < option_count)
        .unwrap_or(0)
}

fn coerce_difficulty(value: Option<&Value>) -> Difficulty {
    value
        .and_then(Value::as_str)
        .and_then(Difficulty::from_label)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const SAMPLE: &str = r#"title: "Sample"
description: "Sample quiz"
questions:
  - question: "What is 1+1?"
    options: ["1", "2", "3", "4"]
    correctAnswer: 1
    explanation: "Basic arithmetic"
    difficulty: "easy"
"#;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sample_yaml_round_trips() {
        let quiz = normalize_response(SAMPLE, ResponseFormat::Yaml, 5).unwrap();
        let expected = QuizData::new(
            "Sample".to_string(),
            "Sample quiz".to_string(),
            vec![QuizQuestion {
                id: "ai-q-1".to_string(),
                question: "What is 1+1?".to_string(),
                options: strings(&["1", "2", "3", "4"]),
                correct_answer: 1,
                explanation: "Basic arithmetic".to_string(),
                difficulty: Difficulty::Easy,
            }],
        );
        assert_eq!(quiz, expected);
    }

    #[test]
    fn wrong_typed_answer_becomes_zero() {
        let raw = SAMPLE.replace("correctAnswer: 1", "correctAnswer: \"one\"");
        let quiz = normalize_response(&raw, ResponseFormat::Yaml, 5).unwrap();
        assert_eq!(quiz.questions[0].correct_answer, 0);
    }

    #[test]
    fn numeric_string_answer_is_read() {
        let raw = SAMPLE.replace("correctAnswer: 1", "correctAnswer: \"2\"");
        let quiz = normalize_response(&raw, ResponseFormat::Yaml, 5).unwrap();
        assert_eq!(quiz.questions[0].correct_answer, 2);
    }

    #[test]
    fn out_of_range_answer_becomes_zero() {
        for bad in ["correctAnswer: 4", "correctAnswer: -1", "correctAnswer: 1.5"] {
            let raw = SAMPLE.replace("correctAnswer: 1", bad);
            let quiz = normalize_response(&raw, ResponseFormat::Yaml, 5).unwrap();
            assert_eq!(quiz.questions[0].correct_answer, 0, "{bad}");
        }
    }

    #[test]
    fn broken_yaml_is_a_parse_error() {
        let err = normalize_response("not: [valid yaml: ]] broken", ResponseFormat::Yaml, 5)
            .unwrap_err();
        assert!(matches!(err, ParseError::Yaml(_)));
    }

    #[test]
    fn broken_json_is_a_parse_error() {
        let err = normalize_response("{\"title\": \"x\", ", ResponseFormat::Json, 5).unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn missing_fields_are_defaulted() {
        let raw = "questions:\n  - question: \"Bare\"\n  - options: \"not a list\"\n    difficulty: \"expert\"\n";
        let quiz = normalize_response(raw, ResponseFormat::Yaml, 5).unwrap();

        assert_eq!(quiz.title, DEFAULT_TITLE);
        assert_eq!(quiz.description, DEFAULT_DESCRIPTION);
        assert_eq!(quiz.questions.len(), 2);
        for question in &quiz.questions {
            assert!(question.options.is_empty());
            assert_eq!(question.correct_answer, 0);
            assert_eq!(question.difficulty, Difficulty::Medium);
            assert_eq!(question.explanation, "");
        }
        assert_eq!(quiz.questions[1].question, "");
        assert_eq!(quiz.questions[1].id, "ai-q-2");
    }

    #[test]
    fn source_ids_are_kept_and_non_mappings_skipped() {
        let raw = "questions:\n  - id: custom\n    question: a\n  - just a string\n  - question: c\n";
        let quiz = normalize_response(raw, ResponseFormat::Yaml, 5).unwrap();
        let ids: Vec<_> = quiz.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["custom", "ai-q-3"]);
    }

    #[test]
    fn output_is_truncated_to_desired_count() {
        let raw = "questions:\n  - question: a\n  - question: b\n  - question: c\n";
        let quiz = normalize_response(raw, ResponseFormat::Yaml, 2).unwrap();
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.questions[1].question, "b");
    }

    #[test]
    fn fenced_yaml_with_prose_is_unwrapped() {
        let raw = format!("Here is your quiz:\n\n```yaml\n{SAMPLE}```\n\nGood luck!");
        let quiz = normalize_response(&raw, ResponseFormat::Yaml, 5).unwrap();
        assert_eq!(quiz.title, "Sample");
        assert_eq!(quiz.questions.len(), 1);
    }

    #[test]
    fn indented_code_blocks_are_not_fences() {
        let raw = "title: Code\nquestions:\n  - question: |\n      What does this print?\n      ```ts\n      console.log(typeof null)\n      ```\n    options: [object, undefined]\n    correctAnswer: 0\n";
        let quiz = normalize_response(raw, ResponseFormat::Yaml, 5).unwrap();
        assert_eq!(quiz.title, "Code");
        assert!(quiz.questions[0].question.contains("```ts"));
        assert_eq!(quiz.questions[0].options, strings(&["object", "undefined"]));
    }

    #[test]
    fn json_with_fence_and_prose() {
        let raw = "Sure! ```json\n{\"title\": \"T\", \"questions\": [{\"question\": \"Q\", \"options\": [\"a\", \"b\", 3], \"correct_answer\": 1, \"difficulty\": \"HARD\"}]}\n```";
        let quiz = normalize_response(raw, ResponseFormat::Json, 5).unwrap();
        assert_eq!(quiz.title, "T");
        let question = &quiz.questions[0];
        assert_eq!(question.options, strings(&["a", "b", "3"]));
        assert_eq!(question.correct_answer, 1);
        assert_eq!(question.difficulty, Difficulty::Hard);
    }

    #[test]
    fn json_without_fence_drops_surrounding_prose() {
        let raw = "The quiz follows. {\"questions\": []} Hope it helps.";
        let quiz = normalize_response(raw, ResponseFormat::Json, 5).unwrap();
        assert!(quiz.is_empty());
    }

    #[test]
    fn odd_options_keep_their_positions() {
        let raw = "questions:\n  - question: q\n    options: [a, null, c, d]\n    correctAnswer: 2\n";
        let quiz = normalize_response(raw, ResponseFormat::Yaml, 5).unwrap();
        let question = &quiz.questions[0];
        assert_eq!(question.options, strings(&["a", "", "c", "d"]));
        assert_eq!(question.correct_option(), Some("c"));

        let raw = r#"{"questions": [{"question": "q", "options": [["x"], "b", "c", "d"], "correctAnswer": 3}]}"#;
        let quiz = normalize_response(raw, ResponseFormat::Json, 5).unwrap();
        let question = &quiz.questions[0];
        assert_eq!(question.options, strings(&[r#"["x"]"#, "b", "c", "d"]));
        assert_eq!(question.correct_option(), Some("d"));
    }

    #[test]
    fn unusual_yaml_keys_are_skipped() {
        let raw = "title: T\n~: stray\n? [a, b]\n: complex\n1: one\nquestions:\n  - question: q\n    options: [a, b]\n";
        let quiz = normalize_response(raw, ResponseFormat::Yaml, 5).unwrap();
        assert_eq!(quiz.title, "T");
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].options, strings(&["a", "b"]));
    }

    #[test]
    fn json_object_is_found_behind_bracketed_prose() {
        let raw = r#"See [1]: {"title": "T", "questions": [{"question": "q", "options": ["a", "b"]}]}"#;
        let quiz = normalize_response(raw, ResponseFormat::Json, 5).unwrap();
        assert_eq!(quiz.title, "T");
        assert_eq!(quiz.questions.len(), 1);

        let raw = r#"See [1]: {"title": "T"}"#;
        let quiz = normalize_response(raw, ResponseFormat::Json, 5).unwrap();
        assert_eq!(quiz.title, "T");
    }

    #[test]
    fn bare_json_list_is_not_cut_to_its_first_object() {
        let raw = r#"Here: [{"question": "a"}, {"question": "b"}]"#;
        let quiz = normalize_response(raw, ResponseFormat::Json, 5).unwrap();
        assert_eq!(quiz.questions.len(), 2);
    }

    #[test]
    fn bare_list_and_scalar_documents() {
        let quiz = normalize_response("- question: only\n", ResponseFormat::Yaml, 5).unwrap();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.title, DEFAULT_TITLE);

        let quiz = normalize_response("just some words", ResponseFormat::Yaml, 5).unwrap();
        assert!(quiz.is_empty());
    }

    #[test]
    fn strip_code_fences_cases() {
        assert_eq!(strip_code_fences("```\nabc\n```"), "abc");
        assert_eq!(strip_code_fences("```yaml\nabc"), "abc");
        assert_eq!(strip_code_fences("abc\n```"), "abc");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn response_format_from_str() {
        assert_eq!("YAML".parse::<ResponseFormat>().unwrap(), ResponseFormat::Yaml);
        assert_eq!("json".parse::<ResponseFormat>().unwrap(), ResponseFormat::Json);
        assert!("toml".parse::<ResponseFormat>().is_err());
    }

    fn question_strategy() -> impl Strategy<Value = serde_json::Value> {
        (
            "[a-zA-Z0-9 ?]{0,16}",
            proptest::collection::vec("[a-z0-9]{1,6}", 0..6),
            -3i64..8,
            prop_oneof![
                Just("easy"),
                Just("medium"),
                Just("hard"),
                Just("unknown"),
            ],
        )
            .prop_map(|(question, options, answer, difficulty)| {
                serde_json::json!({
                    "question": question,
                    "options": options,
                    "correctAnswer": answer,
                    "difficulty": difficulty,
                })
            })
    }

    proptest! {
        #[test]
        fn prop_output_is_bounded_and_indices_valid(
            questions in proptest::collection::vec(question_strategy(), 0..10),
            desired in 1usize..12,
            as_yaml in any::<bool>(),
        ) {
            let raw = serde_json::json!({ "title": "P", "questions": questions }).to_string();
            let format = if as_yaml { ResponseFormat::Yaml } else { ResponseFormat::Json };
            let quiz = normalize_response(&raw, format, desired).unwrap();

            prop_assert!(quiz.questions.len() <= desired);
            prop_assert_eq!(quiz.questions.len(), questions.len().min(desired));
            for question in &quiz.questions {
                if question.options.is_empty() {
                    prop_assert_eq!(question.correct_answer, 0);
                } else {
                    prop_assert!(question.correct_answer < question.options.len());
                }
            }
        }
    }
}
