//! Ingestion surface
//!
//! One inbound payload carries a source descriptor, an organization and a
//! service. Validation runs before any resolution attempt; a rejected
//! payload never touches storage and is never retried. The batch runners
//! for narrative linking and partnership import live in submodules.

pub mod link;
pub mod partners;

use crate::catalog::{OrganizationInput, OrgId, ServiceId, ServiceInput, SourceDescriptor};
use crate::resolve::{Mediator, ResolveError};
use crate::storage::{CatalogStore, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the ingestion surface
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload failed validation; nothing was resolved or stored.
    #[error("invalid request: {0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One inbound record from a source system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub source: SourceDescriptor,
    pub organization: OrganizationInput,
    pub service: ServiceInput,
}

impl IngestRequest {
    /// Reject structurally unusable payloads before any resolution runs.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.source.system.trim().is_empty() {
            return Err(IngestError::Invalid("source.system is required"));
        }
        if self.organization.name.trim().is_empty() {
            return Err(IngestError::Invalid("organization.name is required"));
        }
        if self.service.name.trim().is_empty() {
            return Err(IngestError::Invalid("service.name is required"));
        }
        Ok(())
    }
}

/// What the resolver and mediator decided for one request.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub organization_id: OrgId,
    pub service_id: ServiceId,
    pub organization_created: bool,
    pub service_created: bool,
    pub source_system: String,
}

/// Per-item outcome counts for a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Ingest one record: validate, upsert the organization, then upsert the
/// service under it.
pub fn ingest(store: &dyn CatalogStore, request: &IngestRequest) -> Result<IngestResponse, IngestError> {
    request.validate()?;
    let mediator = Mediator::new(store);

    let org = mediator.upsert_organization(&request.organization, &request.source)?;
    let service = mediator.upsert_service(org.id, &request.service, &request.source)?;

    tracing::info!(
        source = %request.source.system,
        organization = %org.id,
        service = %service.id,
        organization_created = org.created,
        service_created = service.created,
        "ingested record"
    );

    Ok(IngestResponse {
        organization_id: org.id,
        service_id: service.id,
        organization_created: org.created,
        service_created: service.created,
        source_system: request.source.system.clone(),
    })
}

/// Ingest a batch with per-item error isolation. One bad record is counted
/// and logged, not allowed to stop the queue.
pub fn ingest_batch(store: &dyn CatalogStore, requests: &[IngestRequest]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for request in requests {
        match ingest(store, request) {
            Ok(response) if response.service_created => summary.created += 1,
            Ok(_) => summary.updated += 1,
            Err(IngestError::Invalid(reason)) => {
                tracing::warn!(source = %request.source.system, reason, "rejected record");
                summary.skipped += 1;
            }
            Err(err) => {
                tracing::warn!(
                    source = %request.source.system,
                    record_id = request.source.record_id.as_deref().unwrap_or("-"),
                    error = %err,
                    "failed to ingest record"
                );
                summary.failed += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn request(system: &str, org: &str, service: &str) -> IngestRequest {
        IngestRequest {
            source: SourceDescriptor::new(system),
            organization: OrganizationInput {
                name: org.to_string(),
                ..Default::default()
            },
            service: ServiceInput {
                name: service.to_string(),
                ..Default::default()
            },
        }
    }

    // === Scenario: missing required fields rejected before resolution ===
    #[test]
    fn blank_source_system_is_rejected() {
        let store = MemoryStore::new();
        let err = ingest(&store, &request("  ", "Org", "Service")).unwrap_err();
        assert!(matches!(err, IngestError::Invalid(_)));
        assert!(store.find_organization_by_slug("org").unwrap().is_none());
    }

    #[test]
    fn blank_names_are_rejected() {
        let store = MemoryStore::new();
        assert!(ingest(&store, &request("acnc", "", "Service")).is_err());
        assert!(ingest(&store, &request("acnc", "Org", " ")).is_err());
    }

    // === Scenario: double-ingest is idempotent end to end ===
    #[test]
    fn repeat_ingest_reports_existing_ids() {
        let store = MemoryStore::new();
        let req = request("acnc", "Sisters Inside", "Court Support");

        let first = ingest(&store, &req).unwrap();
        let second = ingest(&store, &req).unwrap();

        assert!(first.organization_created && first.service_created);
        assert!(!second.organization_created && !second.service_created);
        assert_eq!(first.organization_id, second.organization_id);
        assert_eq!(first.service_id, second.service_id);
    }

    #[test]
    fn batch_isolates_bad_records() {
        let store = MemoryStore::new();
        let batch = vec![
            request("acnc", "Org One", "Service One"),
            request("", "Org Two", "Service Two"),
            request("acnc", "Org One", "Service One"),
        ];
        let summary = ingest_batch(&store, &batch);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }
}
