//! Association scoring and score propagation
//!
//! `scorer` decides which target a narrative item points at; `rating`
//! folds confirmed association counts back into the targets' rating fields.

mod rating;
mod scorer;

pub use rating::{composite_index, InvalidScale, RatingScale};
pub use scorer::{score_candidates, select_winner, ScorerConfig, TieBreak};
