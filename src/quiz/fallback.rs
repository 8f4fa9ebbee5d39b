//! Static quizzes used when generation fails.
//!
//! Output depends only on the arguments: no randomness, no I/O.

use super::{Difficulty, QuizData, QuizQuestion};
use crate::knowledge::Category;

const TITLE_SLOT: &str = "{title}";

struct QuestionTemplate {
    question: &'static str,
    options: &'static [&'static str],
    correct_answer: usize,
    explanation: &'static str,
    difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelTier {
    Introductory,
    Intermediate,
    Expert,
}

impl LevelTier {
    fn from_level(level: u8) -> Self {
        match level {
            0..=3 => LevelTier::Introductory,
            4..=6 => LevelTier::Intermediate,
            _ => LevelTier::Expert,
        }
    }
}

const HOW_TO_LEARN: QuestionTemplate = QuestionTemplate {
    question: "What is the most effective way to learn {title}?",
    options: &[
        "Reading the theory only",
        "Writing small examples",
        "Reading the official documentation",
        "All of the above",
    ],
    correct_answer: 3,
    explanation: "Programming concepts stick best when theory, documentation and hands-on practice are combined.",
    difficulty: Difficulty::Easy,
};

const BASIC_INTRODUCTORY: &[QuestionTemplate] = &[
    QuestionTemplate {
        question: "Which statement best describes {title}?",
        options: &[
            "An optional runtime library",
            "A foundation you will rely on in everyday TypeScript code",
            "Something that only matters for large teams",
            "A replacement for JavaScript at runtime",
        ],
        correct_answer: 1,
        explanation: "{title} is a fundamental building block; later concepts assume you know it well.",
        difficulty: Difficulty::Easy,
    },
    HOW_TO_LEARN,
];

const BASIC_FURTHER: &[QuestionTemplate] = &[
    QuestionTemplate {
        question: "Where does {title} help you the most?",
        options: &[
            "Catching mistakes at compile time",
            "Making the emitted JavaScript run faster",
            "Reducing bundle size",
            "Replacing unit tests entirely",
        ],
        correct_answer: 0,
        explanation: "Type-level features like {title} exist to surface mistakes before the code runs.",
        difficulty: Difficulty::Medium,
    },
    HOW_TO_LEARN,
];

const ADVANCED: &[QuestionTemplate] = &[
    QuestionTemplate {
        question: "What should you be comfortable with before using {title}?",
        options: &[
            "Nothing, it stands on its own",
            "The basic type system: annotations, interfaces and unions",
            "CSS layout",
            "Browser rendering internals",
        ],
        correct_answer: 1,
        explanation: "{title} builds directly on the basic type system.",
        difficulty: Difficulty::Medium,
    },
    QuestionTemplate {
        question: "What is a common pitfall when applying {title}?",
        options: &[
            "Over-engineering types that could stay simple",
            "It cannot be combined with functions",
            "It turns off type checking for the whole file",
            "It only works in Node.js",
        ],
        correct_answer: 0,
        explanation: "Advanced type features are powerful, but overly clever types hurt readability.",
        difficulty: Difficulty::Hard,
    },
];

const PRACTICAL: &[QuestionTemplate] = &[QuestionTemplate {
    question: "When does {title} pay off the most?",
    options: &[
        "In real project code and configuration",
        "Only in interview questions",
        "Never in production code",
        "Only inside test files",
    ],
    correct_answer: 0,
    explanation: "{title} is a practical tool aimed at day-to-day project work.",
    difficulty: Difficulty::Medium,
}];

const GENERIC: &[QuestionTemplate] = &[
    QuestionTemplate {
        question: "Which statement about {title} is correct?",
        options: &[
            "It is a rich concept",
            "It deserves careful study",
            "It is core knowledge",
            "All of the above",
        ],
        correct_answer: 3,
        explanation: "{title} needs a well-rounded understanding: its depth, its details and why it matters.",
        difficulty: Difficulty::Medium,
    },
    HOW_TO_LEARN,
];

fn templates_for(category: &Category, tier: LevelTier) -> &'static [QuestionTemplate] {
    match (category, tier) {
        (Category::Basic, LevelTier::Introductory) => BASIC_INTRODUCTORY,
        (Category::Basic, _) => BASIC_FURTHER,
        (Category::Advanced, _) => ADVANCED,
        (Category::Practical, _) => PRACTICAL,
        (Category::Unknown(_), _) => GENERIC,
    }
}

/// Builds the offline quiz for a concept. Never fails.
pub fn fallback_quiz(title: &str, description: &str, level: u8, category: &Category) -> QuizData {
    let title = if title.trim().is_empty() {
        "this concept"
    } else {
        title.trim()
    };
    let questions = templates_for(category, LevelTier::from_level(level))
        .iter()
        .enumerate()
        .map(|(index, template)| QuizQuestion {
            id: format!("fallback-{}", index + 1),
            question: template.question.replace(TITLE_SLOT, title),
            options: template.options.iter().map(|o| o.to_string()).collect(),
            correct_answer: template.correct_answer,
            explanation: template.explanation.replace(TITLE_SLOT, title),
            difficulty: template.difficulty,
        })
        .collect();

    let description = if description.trim().is_empty() {
        "Practice questions prepared offline".to_string()
    } else {
        description.trim().to_string()
    };

    QuizData::new(format!("{title}: practice quiz"), description, questions)
}
