//! Keyword classifier for loosely described relationships
//!
//! Two stages. A relevance vocabulary gates classification: text with no
//! domain signal at all is skipped rather than forced into a category. Past
//! the gate, an ordered rule table is scanned top to bottom and the first
//! rule with any case-insensitive keyword hit names the category; nothing
//! matching falls through to the default. Table order is semantic, so the
//! table is configuration (YAML) rather than code, and entry order is
//! preserved as list order.

use serde::{Deserialize, Serialize};

/// Category assigned when the text is relevant but matches no rule.
pub const DEFAULT_CATEGORY: &str = "other";

/// Outcome of classifying one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Category(String),
    /// The relevance gate did not match; no category was invented.
    Skipped,
}

impl Classification {
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Category(c) => Some(c),
            Self::Skipped => None,
        }
    }
}

/// One ordered classification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub category: String,
    pub keywords: Vec<String>,
}

/// The full classifier configuration: relevance gate plus ordered rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTable {
    /// Vocabulary the text must touch before any rule is consulted
    pub relevance: Vec<String>,
    /// Scanned in order; first hit wins
    pub rules: Vec<Rule>,
    pub default_category: String,
}

impl RuleTable {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Whether the text touches the domain vocabulary at all.
    pub fn is_relevant(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.relevance
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()))
    }

    /// Classify one piece of free text.
    pub fn classify(&self, text: &str) -> Classification {
        if !self.is_relevant(text) {
            return Classification::Skipped;
        }
        let text = text.to_lowercase();
        for rule in &self.rules {
            let hit = rule
                .keywords
                .iter()
                .any(|keyword| text.contains(&keyword.to_lowercase()));
            if hit {
                return Classification::Category(rule.category.clone());
            }
        }
        Classification::Category(self.default_category.clone())
    }
}

fn rule(category: &str, keywords: &[&str]) -> Rule {
    Rule {
        category: category.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            relevance: [
                "justice",
                "juvenile",
                "incarceration",
                "rehabilitation",
                "restorative",
                "recidivism",
                "court",
                "legal",
                "prison",
                "detention",
                "youth crime",
                "youth empowerment",
                "youth advocacy",
                "at-risk youth",
                "youth support",
                "drug and alcohol",
                "homelessness",
                "mental health",
                "family healing",
                "community safety",
                "crime prevention",
                "indigenous justice",
                "cultural healing",
                "police",
                "offending",
                "diversion",
                "support service",
                "social worker",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            rules: vec![
                rule("education_provider", &["education"]),
                rule("health_provider", &["health", "mental"]),
                rule("legal_support", &["legal"]),
                rule("cultural_program", &["cultural", "indigenous"]),
                rule("housing_support", &["housing"]),
                rule("employment_support", &["employment", "job"]),
                rule("family_connection", &["family"]),
                rule("mentoring", &["mentor"]),
                rule("advocacy", &["advocacy"]),
                rule("post_release_support", &["post", "release"]),
            ],
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}
