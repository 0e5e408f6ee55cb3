//! Narrative link batch
//!
//! Takes a bounded slice of unlinked narrative items, scores each against
//! the full target catalog, records at most one association per item, and
//! rolls the new association counts back into the targets' rating fields.
//! Each item persists (or fails) on its own; re-running the batch is safe
//! because duplicate associations are no-ops and the scorer is
//! deterministic.

use super::{BatchSummary, IngestError};
use crate::catalog::Association;
use crate::classify::{Classification, RuleTable};
use crate::scoring::{composite_index, score_candidates, select_winner, RatingScale, ScorerConfig};
use crate::storage::CatalogStore;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on items per run.
pub const DEFAULT_BATCH_LIMIT: usize = 50;

/// Configuration for one link run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Max items per run; the rest wait for the next run
    pub batch_limit: usize,
    /// Courtesy pause between items, in milliseconds. Zero is safe.
    pub delay_ms: u64,
    pub scorer: ScorerConfig,
    pub classifier: RuleTable,
    pub rating_scale: RatingScale,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            delay_ms: 1_000,
            scorer: ScorerConfig::default(),
            classifier: RuleTable::default(),
            rating_scale: RatingScale::default(),
        }
    }
}

impl LinkConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Run one link batch. Storage failure while loading the work queue is
/// fatal; failure on an individual item is counted and logged.
///
/// In the returned summary, `created` counts new associations and `updated`
/// counts rating write-backs to targets. Every new association triggers a
/// write-back, so the two overlap; `created + skipped + failed` is the
/// number of items processed.
pub async fn run_link_batch(
    store: &dyn CatalogStore,
    config: &LinkConfig,
) -> Result<BatchSummary, IngestError> {
    let items = store.list_unlinked_narratives(config.batch_limit)?;
    let targets = store.list_target_entities()?;
    tracing::info!(items = items.len(), targets = targets.len(), "starting link batch");

    let mut summary = BatchSummary::default();
    for (index, item) in items.iter().enumerate() {
        if index > 0 && !config.delay().is_zero() {
            tokio::time::sleep(config.delay()).await;
        }

        let link_type = match config.classifier.classify(&item.full_text()) {
            Classification::Category(category) => category,
            Classification::Skipped => {
                tracing::debug!(item = %item.id, "outside domain vocabulary, skipping");
                summary.skipped += 1;
                continue;
            }
        };

        let scored = score_candidates(&config.scorer, item, &targets);
        let Some((target_id, score)) = select_winner(&config.scorer, &scored) else {
            tracing::debug!(item = %item.id, "no candidate above threshold");
            summary.skipped += 1;
            continue;
        };

        let association = Association {
            source_item_id: item.id,
            target_entity_id: target_id,
            link_type,
            score,
        };
        match link_and_propagate(store, &association, &config.rating_scale) {
            Ok(true) => {
                tracing::info!(item = %item.id, target = %target_id, score, "linked");
                summary.created += 1;
                summary.updated += 1;
            }
            Ok(false) => summary.skipped += 1,
            Err(err) => {
                tracing::warn!(item = %item.id, error = %err, "failed to link item");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(?summary, "link batch finished");
    Ok(summary)
}

/// Insert one association and refresh the target's derived ratings.
/// Returns whether the association was new.
fn link_and_propagate(
    store: &dyn CatalogStore,
    association: &Association,
    scale: &RatingScale,
) -> Result<bool, IngestError> {
    if !store.insert_association(association)? {
        return Ok(false);
    }

    let target_id = association.target_entity_id;
    let count = store.count_associations(target_id)?;
    let rating = scale.rating_for(count);
    if let Some(target) = store.get_target_entity(target_id)? {
        let composite = composite_index(target.evidence_score, rating, target.authority_score);
        store.update_target_ratings(target_id, rating, composite)?;
    }
    Ok(true)
}
