//! Weighted association scorer
//!
//! Every rule is a case-insensitive containment check against a fixed
//! weight; weights are summed, never normalized, so a score reads as "how
//! many independent signals agreed". The weights and threshold are
//! configuration, not code.

use crate::catalog::{NarrativeItem, TargetEntity, TargetId};
use serde::{Deserialize, Serialize};

/// How to pick between candidates with equal top scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First candidate in input order wins. Inherited behavior; stable for
    /// a given candidate ordering but sensitive to it.
    #[default]
    InputOrder,
    /// Lowest target ID wins, independent of candidate ordering.
    LowestId,
}

/// Scoring weights and qualification threshold.
///
/// The theme rule matches a theme tag against the target's entity type or
/// its description text; the other rules each probe a single field pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Target name appears in the item text
    pub name_weight: u32,
    /// Item's declared origin organization matches the target
    pub origin_org_weight: u32,
    /// An item theme appears in the target's entity type or description
    pub theme_weight: u32,
    /// Item's origin location matches a target geography tag
    pub geography_weight: u32,
    /// Minimum total score for an association to qualify
    pub threshold: u32,
    pub tie_break: TieBreak,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            name_weight: 50,
            origin_org_weight: 30,
            theme_weight: 20,
            geography_weight: 15,
            threshold: 40,
            tie_break: TieBreak::default(),
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    !needle.trim().is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Score one candidate against one narrative item.
pub fn score_target(config: &ScorerConfig, item: &NarrativeItem, target: &TargetEntity) -> u32 {
    let text = item.full_text();
    let mut score = 0;

    if contains_ci(&text, &target.name) {
        score += config.name_weight;
    }

    if let Some(origin) = &item.origin_organization {
        if contains_ci(&target.name, origin) || contains_ci(&target.description, origin) {
            score += config.origin_org_weight;
        }
    }

    let theme_matches = item
        .themes
        .iter()
        .any(|theme| contains_ci(&target.entity_type, theme) || contains_ci(&target.description, theme));
    if theme_matches {
        score += config.theme_weight;
    }

    if let Some(location) = &item.origin_location {
        if target.geography.iter().any(|tag| contains_ci(tag, location) || contains_ci(location, tag)) {
            score += config.geography_weight;
        }
    }

    score
}

/// Score all candidates for one item, sorted descending by score.
///
/// The sort is stable, so equal scores keep input order — `select_winner`
/// relies on that for the `InputOrder` tie-break.
pub fn score_candidates(
    config: &ScorerConfig,
    item: &NarrativeItem,
    candidates: &[TargetEntity],
) -> Vec<(TargetId, u32)> {
    let mut scored: Vec<(TargetId, u32)> = candidates
        .iter()
        .map(|target| (target.id, score_target(config, item, target)))
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
}

/// Pick at most one winner from a descending-sorted score list: the
/// strictly highest qualifying score, ties broken by the configured policy.
pub fn select_winner(config: &ScorerConfig, scored: &[(TargetId, u32)]) -> Option<(TargetId, u32)> {
    let (first, top_score) = *scored.first()?;
    if top_score < config.threshold {
        return None;
    }
    match config.tie_break {
        TieBreak::InputOrder => Some((first, top_score)),
        TieBreak::LowestId => scored
            .iter()
            .take_while(|(_, score)| *score == top_score)
            .map(|(id, _)| *id)
            .min()
            .map(|id| (id, top_score)),
    }
}
