//! Partnership import
//!
//! Takes a declarative list of facility-partner links, resolves each side
//! against the catalog, and records typed partnerships. A facility that is
//! closed, or a partner the catalog does not know, is a skip with a log
//! line, never an error: the import list is curated by hand and partial
//! application is expected.

use super::{BatchSummary, IngestError};
use crate::catalog::{OperationalStatus, PartnerRef, Partnership};
use crate::classify::RuleTable;
use crate::storage::CatalogStore;
use serde::{Deserialize, Serialize};

/// Which catalog table a partner name should be resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerKind {
    Organization,
    Program,
    Service,
}

/// One declarative entry in an import list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerSpec {
    pub facility_slug: String,
    pub partner_name: String,
    pub partner_kind: PartnerKind,
    /// When absent, classified from the description
    #[serde(default)]
    pub partnership_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Apply an import list. Loading reference data is fatal; individual
/// entries fail soft.
pub fn run_partner_import(
    store: &dyn CatalogStore,
    classifier: &RuleTable,
    specs: &[PartnerSpec],
) -> Result<BatchSummary, IngestError> {
    // Programs have no indexed name lookup; one scan serves the whole list.
    let programs = store.list_target_entities()?;

    let mut summary = BatchSummary::default();
    for spec in specs {
        match import_one(store, classifier, &programs, spec) {
            Ok(Outcome::Created) => summary.created += 1,
            Ok(Outcome::Skipped(reason)) => {
                tracing::debug!(
                    facility = %spec.facility_slug,
                    partner = %spec.partner_name,
                    reason,
                    "skipped partnership entry"
                );
                summary.skipped += 1;
            }
            Err(err) => {
                tracing::warn!(
                    facility = %spec.facility_slug,
                    partner = %spec.partner_name,
                    error = %err,
                    "failed to import partnership entry"
                );
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

enum Outcome {
    Created,
    Skipped(&'static str),
}

fn import_one(
    store: &dyn CatalogStore,
    classifier: &RuleTable,
    programs: &[crate::catalog::TargetEntity],
    spec: &PartnerSpec,
) -> Result<Outcome, IngestError> {
    let Some(facility) = store.find_facility_by_slug(&spec.facility_slug)? else {
        return Ok(Outcome::Skipped("unknown facility"));
    };
    if facility.operational_status != OperationalStatus::Operational {
        return Ok(Outcome::Skipped("facility not operational"));
    }

    let partner = match spec.partner_kind {
        PartnerKind::Organization => store
            .find_organization_by_name(&spec.partner_name)?
            .map(|org| PartnerRef::Organization(org.id)),
        PartnerKind::Service => store
            .find_service_by_name(&spec.partner_name)?
            .map(|service| PartnerRef::Service(service.id)),
        PartnerKind::Program => {
            let needle = spec.partner_name.to_lowercase();
            programs
                .iter()
                .find(|p| p.name.to_lowercase().contains(&needle))
                .map(|p| PartnerRef::Program(p.id))
        }
    };
    let Some(partner) = partner else {
        return Ok(Outcome::Skipped("unknown partner"));
    };

    let partnership_type = match &spec.partnership_type {
        Some(explicit) => explicit.clone(),
        None => {
            let text = spec.description.as_deref().unwrap_or(&spec.partner_name);
            classifier
                .classify(text)
                .category()
                .unwrap_or(&classifier.default_category)
                .to_string()
        }
    };

    let inserted = store.insert_partnership(&Partnership {
        facility_id: facility.id,
        partner,
        partnership_type,
        is_active: true,
        description: spec.description.clone(),
    })?;
    if inserted {
        Ok(Outcome::Created)
    } else {
        Ok(Outcome::Skipped("already recorded"))
    }
}
