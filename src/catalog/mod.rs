//! Canonical catalog records
//!
//! The single source of truth for resolved entities. Organizations own
//! services; narrative items and target entities are a read-only catalog
//! except for the derived rating fields; partnerships tie facilities to
//! exactly one partner via a tagged reference.

mod entity;
mod narrative;
mod partnership;
mod provenance;

pub use entity::{
    Organization, OrganizationInput, OrgId, Service, ServiceId, ServiceInput, VerificationStatus,
};
pub use narrative::{
    Association, NarrativeId, NarrativeItem, TargetEntity, TargetId,
};
pub use partnership::{Facility, FacilityId, OperationalStatus, PartnerRef, Partnership};
pub use provenance::{ProvenanceEntry, SourceDescriptor};
