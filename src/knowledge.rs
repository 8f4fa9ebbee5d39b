use std::collections::HashSet;
use std::fmt;
use std::io::Read;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::KnowledgeError;

/// Coarse grouping of a concept; unknown tags are kept rather than rejected
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Basic,
    Advanced,
    Practical,
    Unknown(String),
}

impl Category {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "basic" => Category::Basic,
            "advanced" => Category::Advanced,
            "practical" => Category::Practical,
            _ => Category::Unknown(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Category::Basic => "basic",
            Category::Advanced => "advanced",
            Category::Practical => "practical",
            Category::Unknown(tag) => tag,
        }
    }
}

impl From<String> for Category {
    fn from(tag: String) -> Self {
        Category::from_tag(&tag)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConceptNode {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub level: u8,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(serde::Deserialize)]
struct KnowledgeFile {
    concepts: Vec<ConceptNode>,
}

pub struct KnowledgeBase {
    pub concepts: Vec<ConceptNode>,
}

impl KnowledgeBase {
    pub fn new(concepts: Vec<ConceptNode>) -> Result<Self, KnowledgeError> {
        if concepts.is_empty() {
            return Err(KnowledgeError::Empty);
        }
        let mut seen = HashSet::new();
        for concept in &concepts {
            if !seen.insert(concept.id.as_str()) {
                return Err(KnowledgeError::DuplicateId(concept.id.clone()));
            }
        }
        Ok(Self { concepts })
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, KnowledgeError> {
        let file: KnowledgeFile = serde_yaml::from_reader(reader)?;
        Self::new(file.concepts)
    }

    pub fn get(&self, id: &str) -> Option<&ConceptNode> {
        self.concepts.iter().find(|c| c.id == id)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&ConceptNode> {
        self.concepts.iter().find(|c| c.title == title.trim())
    }

    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&ConceptNode> {
        self.concepts.choose(rng)
    }

    /// Titles of the prerequisites that exist in this knowledge base
    pub fn prerequisite_titles(&self, concept: &ConceptNode) -> Vec<&str> {
        concept
            .prerequisites
            .iter()
            .filter_map(|id| self.get(id))
            .map(|c| c.title.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SMALL: &str = r###"
concepts:
  - id: basics
    title: Basics
    description: The basics
    category: basic
    level: 1
  - id: generics
    title: Generics
    description: Type parameters
    category: Advanced
    level: 5
    prerequisites: [basics, missing]
    content: "## Generic functions"
    examples: ["function id<T>(x: T): T { return x; }"]
  - id: odd
    title: Odd
    description: Unusual
    category: experimental
    level: 3
"###;

    #[test]
    fn loads_concepts_from_yaml() {
        let kb = KnowledgeBase::from_reader(SMALL.as_bytes()).unwrap();
        assert_eq!(kb.concepts.len(), 3);

        let generics = kb.get("generics").unwrap();
        assert_eq!(generics.category, Category::Advanced);
        assert_eq!(generics.examples.len(), 1);
        assert_eq!(kb.prerequisite_titles(generics), vec!["Basics"]);
        assert_eq!(
            kb.get("odd").unwrap().category,
            Category::Unknown("experimental".to_string())
        );
        assert_eq!(kb.find_by_title(" Basics ").unwrap().id, "basics");
    }

    #[test]
    fn rejects_duplicates_and_empty_sets() {
        let dup = "concepts:\n  - {id: a, title: A, description: d, category: basic, level: 1}\n  - {id: a, title: B, description: d, category: basic, level: 2}\n";
        assert!(matches!(
            KnowledgeBase::from_reader(dup.as_bytes()),
            Err(KnowledgeError::DuplicateId(id)) if id == "a"
        ));
        assert!(matches!(
            KnowledgeBase::from_reader("concepts: []".as_bytes()),
            Err(KnowledgeError::Empty)
        ));
    }

    #[test]
    fn random_pick_comes_from_the_set() {
        let kb = KnowledgeBase::from_reader(SMALL.as_bytes()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let picked = kb.random(&mut rng).unwrap();
        assert!(kb.get(&picked.id).is_some());
    }

    #[test]
    fn bundled_concepts_load() {
        let kb = KnowledgeBase::from_reader(
            include_str!("../data/concepts.yaml").as_bytes(),
        )
        .unwrap();
        assert!(kb.get("why-typescript").is_some());
        for concept in &kb.concepts {
            for prerequisite in &concept.prerequisites {
                assert!(kb.get(prerequisite).is_some(), "{prerequisite}");
            }
        }
    }
}
