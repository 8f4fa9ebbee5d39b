use crate::knowledge::ConceptNode;
use crate::quiz::normalize::ResponseFormat;

const YAML_SCHEMA: &str = r#"title: "Quiz title"
description: "One sentence about the quiz"
questions:
  - question: "Question text"
    options:
      - "Option A"
      - "Option B"
      - "Option C"
      - "Option D"
    correctAnswer: 0  # index of the correct option (0-3)
    explanation: "Why the answer is correct"
    difficulty: "easy"  # easy, medium or hard"#;

const JSON_SCHEMA: &str = r#"{
  "title": "Quiz title",
  "description": "One sentence about the quiz",
  "questions": [
    {
      "question": "Question text",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correctAnswer": 0,
      "explanation": "Why the answer is correct",
      "difficulty": "easy"
    }
  ]
}"#;

/// Guesses the programming language a concept is about. First match wins.
pub fn detect_language(text: &str) -> Option<&'static str> {
    const RULES: &[(&str, &[&str])] = &[
        ("typescript", &["TypeScript", "interface", ".ts"]),
        ("javascript", &["JavaScript", ".js"]),
        ("python", &["Python", ".py"]),
        ("java", &["Java", "class "]),
        ("cpp", &["C++", "#include"]),
        ("go", &["Go", "func "]),
    ];
    RULES
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| text.contains(m)))
        .map(|(language, _)| *language)
}

pub fn build_quiz_prompt(
    concept: &ConceptNode,
    question_count: usize,
    format: ResponseFormat,
) -> String {
    let language_hint = detect_language(&format!("{} {}", concept.content, concept.description))
        .map(|language| format!("The material is mainly about {language}. "))
        .unwrap_or_default();

    let (format_name, schema) = match format {
        ResponseFormat::Yaml => ("YAML", YAML_SCHEMA),
        ResponseFormat::Json => ("JSON", JSON_SCHEMA),
    };

    format!(
        "You are an expert at writing educational multiple-choice tests.
Generate exactly {question_count} questions about the following concept.

Concept title: {title}
Concept description: {description}
Concept level: {level}
Concept category: {category}
Concept content:
{content}

{language_hint}Questions should reflect real-world usage.

Answer in strict {format_name} with this structure:

{schema}

Requirements:
1. Every question has exactly 4 distinct options.
2. Wrong options are plausible but not tricky.
3. Explanations are clear and help the learner.
4. Difficulty matches level {level} and increases gradually.
5. Output only the {format_name} document, with no extra text.",
        title = concept.title,
        description = concept.description,
        level = concept.level,
        category = concept.category,
        content = concept.content,
    )
}
