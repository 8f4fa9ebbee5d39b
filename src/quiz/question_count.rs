//! How many questions to ask for a concept, scored from the structure of its
//! markdown content.

use std::sync::OnceLock;

use regex::Regex;

pub const MIN_QUESTIONS: usize = 3;
pub const MAX_QUESTIONS: usize = 12;
const MAX_BASE_QUESTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStructure {
    /// Rough number of distinct ideas, never below [`MIN_QUESTIONS`]
    pub concept_count: usize,
    /// Deepest heading level, counted from `##` as 1
    pub depth: usize,
    pub has_code: bool,
    pub structural_richness: usize,
}

struct Patterns {
    heading: Regex,
    list_item: Regex,
    code_block: Regex,
    inline_code: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        heading: Regex::new(r"(?m)^#{2,6}\s+").expect("static regex"),
        list_item: Regex::new(r"(?m)^\s*[-*+]\s+").expect("static regex"),
        code_block: Regex::new(r"(?s)```.*?```").expect("static regex"),
        inline_code: Regex::new(r"`[^`]+`").expect("static regex"),
    })
}

pub fn analyze_content(content: &str) -> ContentStructure {
    let patterns = patterns();

    let headings: Vec<&str> = patterns
        .heading
        .find_iter(content)
        .map(|m| m.as_str())
        .collect();
    let list_items = patterns.list_item.find_iter(content).count();
    let code_blocks = patterns.code_block.find_iter(content).count();
    let inline_code = patterns.inline_code.find_iter(content).count();

    // a heading, three list items, or two code snippets each stand for one idea
    let concept_count = headings
        .len()
        .max(list_items.div_ceil(3))
        .max((code_blocks + inline_code).div_ceil(2));

    let depth = headings
        .iter()
        .map(|h| h.matches('#').count() - 1)
        .fold(1, usize::max);

    ContentStructure {
        concept_count: concept_count.max(MIN_QUESTIONS),
        depth,
        has_code: code_blocks > 0 || inline_code > 0,
        structural_richness: headings.len() + list_items + code_blocks,
    }
}

/// Always within `[MIN_QUESTIONS, MAX_QUESTIONS]`.
pub fn desired_question_count(content: &str, example_count: usize) -> usize {
    let structure = analyze_content(content);

    let base = structure.concept_count.clamp(MIN_QUESTIONS, MAX_BASE_QUESTIONS) as f64;
    let depth_multiplier = 1.0 + (structure.depth as f64 - 1.0) * 0.2;
    let example_bonus = (example_count as f64 * 0.5).min(3.0);

    let count = (base * depth_multiplier + example_bonus).round() as usize;
    count.clamp(MIN_QUESTIONS, MAX_QUESTIONS)
}
