//! Storage trait definitions

use crate::catalog::{
    Association, Facility, FacilityId, NarrativeId, NarrativeItem, Organization, OrgId,
    Partnership, Service, ServiceId, TargetEntity, TargetId, VerificationStatus,
};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A uniqueness constraint rejected an insert. This is a correctness
    /// signal for the resolve layer, not a generic failure: it means another
    /// writer created the same entity first.
    #[error("Uniqueness conflict on {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Filter criteria for querying services
#[derive(Debug, Clone)]
pub struct ServiceFilter {
    /// Filter by ingesting source system
    pub source_system: Option<String>,
    /// Filter by verification status
    pub status: Option<VerificationStatus>,
    /// 1-based page number
    pub page: usize,
    /// Page size
    pub limit: usize,
}

impl Default for ServiceFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceFilter {
    pub fn new() -> Self {
        Self {
            source_system: None,
            status: None,
            page: 1,
            limit: 100,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_system = Some(source.into());
        self
    }

    pub fn with_status(mut self, status: VerificationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, 1000);
        self
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.limit
    }
}

/// Trait for the canonical catalog store
///
/// All entity mutation goes through this trait; the uniqueness invariants
/// are the implementation's responsibility, and implementations must report
/// violations as `StorageError::Conflict` so the resolve layer can
/// distinguish a creation race from a real failure. Implementations must be
/// thread-safe (Send + Sync).
pub trait CatalogStore: Send + Sync {
    // === Organizations ===

    /// Insert a new organization. `Conflict` if the slug, or a non-empty
    /// website, is already taken.
    fn insert_organization(&self, org: &Organization) -> StorageResult<()>;

    /// Persist updated fields and provenance for an existing organization.
    fn update_organization(&self, org: &Organization) -> StorageResult<()>;

    fn get_organization(&self, id: OrgId) -> StorageResult<Option<Organization>>;

    fn find_organization_by_slug(&self, slug: &str) -> StorageResult<Option<Organization>>;

    fn find_organization_by_website(&self, website: &str) -> StorageResult<Option<Organization>>;

    /// Case-insensitive containment lookup, used by the partnership import.
    fn find_organization_by_name(&self, fragment: &str) -> StorageResult<Option<Organization>>;

    // === Services ===

    /// Insert a new service. `Conflict` if the owner already has a service
    /// with this slug.
    fn insert_service(&self, service: &Service) -> StorageResult<()>;

    fn update_service(&self, service: &Service) -> StorageResult<()>;

    fn get_service(&self, id: ServiceId) -> StorageResult<Option<Service>>;

    fn find_service_by_slug(&self, org: OrgId, slug: &str) -> StorageResult<Option<Service>>;

    fn find_service_by_website(&self, org: OrgId, website: &str) -> StorageResult<Option<Service>>;

    fn find_service_by_source_url(&self, org: OrgId, url: &str) -> StorageResult<Option<Service>>;

    fn find_service_by_name(&self, fragment: &str) -> StorageResult<Option<Service>>;

    /// Page of services matching the filter, newest first.
    fn list_services(&self, filter: &ServiceFilter) -> StorageResult<Vec<Service>>;

    /// Total count matching the filter, ignoring pagination.
    fn count_services(&self, filter: &ServiceFilter) -> StorageResult<usize>;

    // === Narrative catalog ===

    fn save_narrative_item(&self, item: &NarrativeItem) -> StorageResult<()>;

    /// Narrative items not yet linked to any target, capped.
    fn list_unlinked_narratives(&self, limit: usize) -> StorageResult<Vec<NarrativeItem>>;

    fn save_target_entity(&self, entity: &TargetEntity) -> StorageResult<()>;

    fn get_target_entity(&self, id: TargetId) -> StorageResult<Option<TargetEntity>>;

    fn list_target_entities(&self) -> StorageResult<Vec<TargetEntity>>;

    /// Write back the derived rating fields after score propagation.
    fn update_target_ratings(
        &self,
        id: TargetId,
        narrative_rating: u8,
        composite_index: f64,
    ) -> StorageResult<()>;

    // === Associations ===

    /// Insert an association. Returns `false` without error when the
    /// `(source_item_id, target_entity_id)` pair already exists.
    fn insert_association(&self, association: &Association) -> StorageResult<bool>;

    fn count_associations(&self, target: TargetId) -> StorageResult<usize>;

    fn list_associations_for_item(&self, item: NarrativeId) -> StorageResult<Vec<Association>>;

    // === Facilities & partnerships ===

    fn save_facility(&self, facility: &Facility) -> StorageResult<()>;

    fn find_facility_by_slug(&self, slug: &str) -> StorageResult<Option<Facility>>;

    /// Insert a partnership. Returns `false` without error when the
    /// `(facility_id, partner_kind, partner_id)` triple already exists.
    fn insert_partnership(&self, partnership: &Partnership) -> StorageResult<bool>;

    fn count_partnerships(&self, facility: FacilityId) -> StorageResult<usize>;
}

/// Trait for stores that can be opened from a path
pub trait OpenStore: CatalogStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
