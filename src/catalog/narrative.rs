//! Narrative content and the catalog entities it can be linked to
//!
//! Both sides of an association. Narrative items are read-only input; target
//! entities are read-only except for the derived rating fields written back
//! by score propagation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a narrative item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NarrativeId(Uuid);

impl NarrativeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for NarrativeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NarrativeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a target entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(Uuid);

impl TargetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A piece of free-text content that is a candidate source for association
/// scoring: a story, a case study, an extracted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeItem {
    pub id: NarrativeId,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub themes: Vec<String>,
    /// Declared origin organization, when the source system knew it
    #[serde(default)]
    pub origin_organization: Option<String>,
    /// Declared origin location (state, region, town)
    #[serde(default)]
    pub origin_location: Option<String>,
}

impl NarrativeItem {
    /// Title and body joined, the text every scoring rule runs against.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }
}

/// A catalog item that narrative items or partner relationships can be
/// linked to: a program, an intervention, a campaign.
///
/// The catalog supplies `evidence_score` and `authority_score`; this core
/// writes back `narrative_rating` and `composite_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEntity {
    pub id: TargetId,
    pub name: String,
    pub description: String,
    /// Free-form type label, e.g. "Wraparound Support"
    pub entity_type: String,
    #[serde(default)]
    pub geography: Vec<String>,
    /// Externally supplied evidence level, 0–10
    #[serde(default)]
    pub evidence_score: Option<f64>,
    /// Externally supplied authority score, 0–10
    #[serde(default)]
    pub authority_score: Option<f64>,
    /// Derived from confirmed association count, 0–10
    #[serde(default)]
    pub narrative_rating: u8,
    /// Weighted blend of rating, evidence and authority
    #[serde(default)]
    pub composite_index: f64,
}

impl TargetEntity {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: TargetId::new(),
            name: name.into(),
            description: description.into(),
            entity_type: entity_type.into(),
            geography: Vec::new(),
            evidence_score: None,
            authority_score: None,
            narrative_rating: 0,
            composite_index: 0.0,
        }
    }

    pub fn with_geography(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.geography = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A scored, typed link between a narrative item and a target entity.
///
/// Invariant: at most one association per `(source_item_id,
/// target_entity_id)` pair. Inserting a duplicate is a no-op, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub source_item_id: NarrativeId,
    pub target_entity_id: TargetId,
    /// Semantic category assigned by the classifier
    pub link_type: String,
    /// Total rule score at link time
    pub score: u32,
}
