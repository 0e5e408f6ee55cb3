//! Upsert mediator
//!
//! Sits between resolution and storage. Resolution miss creates; hit merges
//! under the never-overwrite-with-empty rule. Creation can lose a race with
//! another writer even after a clean miss; the unique constraint reports
//! that as `StorageError::Conflict`, and the mediator resolves it by
//! re-running resolution exactly once. A second conflict for the same item
//! is surfaced — this is the only retry in the core.

use super::resolver::{resolve_organization, resolve_service, OrgKeys, ServiceKeys};
use crate::catalog::{
    Organization, OrganizationInput, OrgId, Service, ServiceId, ServiceInput, SourceDescriptor,
};
use crate::normalize::{canonical_url, slugify};
use crate::storage::{CatalogStore, StorageError};
use thiserror::Error;

/// Errors from the resolve/upsert path
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Creation conflicted twice for the same item. One conflict is an
    /// expected race; two means the store and the resolver disagree about
    /// identity, which needs a human.
    #[error("repeated creation conflict for '{0}'")]
    CreationRace(String),

    /// Resolution returned an ID the store then failed to load.
    #[error("resolved entity vanished during upsert: {0}")]
    Vanished(String),
}

/// Outcome of an upsert: the canonical ID and whether it was newly created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome<Id> {
    pub id: Id,
    pub created: bool,
}

/// Create-or-merge mediator over a catalog store.
pub struct Mediator<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> Mediator<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    /// Upsert an organization described by a source system.
    pub fn upsert_organization(
        &self,
        input: &OrganizationInput,
        source: &SourceDescriptor,
    ) -> Result<UpsertOutcome<OrgId>, ResolveError> {
        let mut input = input.clone();
        input.website = input.website.as_deref().and_then(canonical_url);
        let source = canonical_source(source);
        let keys = OrgKeys {
            slug: slugify(&input.name),
            website: input.website.clone(),
        };

        for attempt in 0..2 {
            if let Some(id) = resolve_organization(self.store, &keys)? {
                let mut org = self
                    .store
                    .get_organization(id)?
                    .ok_or_else(|| ResolveError::Vanished(format!("organization {}", id)))?;
                if org.merge(&input, &source) {
                    self.store.update_organization(&org)?;
                }
                return Ok(UpsertOutcome { id, created: false });
            }

            let org = Organization::from_input(&input, keys.slug.clone(), &source);
            match self.store.insert_organization(&org) {
                Ok(()) => return Ok(UpsertOutcome { id: org.id, created: true }),
                Err(StorageError::Conflict(constraint)) if attempt == 0 => {
                    tracing::debug!(
                        slug = %keys.slug,
                        %constraint,
                        "organization creation lost a race, re-resolving"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ResolveError::CreationRace(keys.slug))
    }

    /// Upsert a service under its owning organization.
    pub fn upsert_service(
        &self,
        org: OrgId,
        input: &ServiceInput,
        source: &SourceDescriptor,
    ) -> Result<UpsertOutcome<ServiceId>, ResolveError> {
        let mut input = input.clone();
        input.website = input.website.as_deref().and_then(canonical_url);
        let source = canonical_source(source);
        let keys = ServiceKeys {
            slug: slugify(&input.name),
            website: input.website.clone(),
            source_url: source.url.clone(),
        };

        for attempt in 0..2 {
            if let Some(id) = resolve_service(self.store, org, &keys)? {
                let mut service = self
                    .store
                    .get_service(id)?
                    .ok_or_else(|| ResolveError::Vanished(format!("service {}", id)))?;
                if service.merge(&input, &source) {
                    self.store.update_service(&service)?;
                }
                return Ok(UpsertOutcome { id, created: false });
            }

            let service = Service::from_input(org, &input, keys.slug.clone(), &source);
            match self.store.insert_service(&service) {
                Ok(()) => return Ok(UpsertOutcome { id: service.id, created: true }),
                Err(StorageError::Conflict(constraint)) if attempt == 0 => {
                    tracing::debug!(
                        slug = %keys.slug,
                        %constraint,
                        "service creation lost a race, re-resolving"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ResolveError::CreationRace(keys.slug))
    }
}

/// Rewrite a source descriptor's URL into canonical form so stored
/// provenance and future cascade probes agree on the key.
fn canonical_source(source: &SourceDescriptor) -> SourceDescriptor {
    let mut source = source.clone();
    source.url = source.url.as_deref().and_then(canonical_url);
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        Association, Facility, FacilityId, NarrativeId, NarrativeItem, Partnership, TargetEntity,
        TargetId,
    };
    use crate::storage::{MemoryStore, ServiceFilter, StorageResult};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn org_input(name: &str) -> OrganizationInput {
        OrganizationInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    // === Scenario: double-ingest of the same record is idempotent ===
    #[test]
    fn second_upsert_merges_instead_of_creating() {
        let store = MemoryStore::new();
        let mediator = Mediator::new(&store);
        let source = SourceDescriptor::new("acnc");

        let first = mediator.upsert_organization(&org_input("Sisters Inside"), &source).unwrap();
        let second = mediator.upsert_organization(&org_input("Sisters Inside"), &source).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn upsert_canonicalizes_website_before_matching() {
        let store = MemoryStore::new();
        let mediator = Mediator::new(&store);
        let source = SourceDescriptor::new("acnc");

        let mut input = org_input("Youth Law");
        input.website = Some("HTTPS://YouthLaw.org.au/?utm=1".to_string());
        let first = mediator.upsert_organization(&input, &source).unwrap();

        // Different display name, same site, differently messy URL.
        let mut renamed = org_input("Youth Law Australia");
        renamed.website = Some("https://youthlaw.org.au/".to_string());
        let second = mediator
            .upsert_organization(&renamed, &SourceDescriptor::new("askizzy"))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(!second.created);
    }

    #[test]
    fn service_upserts_scoped_to_owner() {
        let store = MemoryStore::new();
        let mediator = Mediator::new(&store);
        let source = SourceDescriptor::new("acnc");

        let org_a = mediator.upsert_organization(&org_input("Org A"), &source).unwrap().id;
        let org_b = mediator.upsert_organization(&org_input("Org B"), &source).unwrap().id;

        let input = ServiceInput {
            name: "Outreach".to_string(),
            ..Default::default()
        };
        let a = mediator.upsert_service(org_a, &input, &source).unwrap();
        let b = mediator.upsert_service(org_b, &input, &source).unwrap();

        assert!(a.created);
        assert!(b.created);
        assert_ne!(a.id, b.id);
    }

    /// Store that loses the first organization insert to a simulated
    /// concurrent writer: the competitor lands just before our insert, so
    /// the unique constraint fires once, then resolution can see it.
    struct RacingStore {
        inner: MemoryStore,
        raced: AtomicBool,
        competitor_name: String,
    }

    impl RacingStore {
        fn new(competitor_name: &str) -> Self {
            Self {
                inner: MemoryStore::new(),
                raced: AtomicBool::new(false),
                competitor_name: competitor_name.to_string(),
            }
        }
    }

    impl CatalogStore for RacingStore {
        fn insert_organization(&self, org: &Organization) -> StorageResult<()> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let competitor = Organization::from_input(
                    &org_input(&self.competitor_name),
                    org.slug.clone(),
                    &SourceDescriptor::new("competitor"),
                );
                self.inner.insert_organization(&competitor)?;
            }
            self.inner.insert_organization(org)
        }

        fn update_organization(&self, org: &Organization) -> StorageResult<()> {
            self.inner.update_organization(org)
        }
        fn get_organization(&self, id: OrgId) -> StorageResult<Option<Organization>> {
            self.inner.get_organization(id)
        }
        fn find_organization_by_slug(&self, slug: &str) -> StorageResult<Option<Organization>> {
            self.inner.find_organization_by_slug(slug)
        }
        fn find_organization_by_website(&self, website: &str) -> StorageResult<Option<Organization>> {
            self.inner.find_organization_by_website(website)
        }
        fn find_organization_by_name(&self, fragment: &str) -> StorageResult<Option<Organization>> {
            self.inner.find_organization_by_name(fragment)
        }
        fn insert_service(&self, service: &Service) -> StorageResult<()> {
            self.inner.insert_service(service)
        }
        fn update_service(&self, service: &Service) -> StorageResult<()> {
            self.inner.update_service(service)
        }
        fn get_service(&self, id: ServiceId) -> StorageResult<Option<Service>> {
            self.inner.get_service(id)
        }
        fn find_service_by_slug(&self, org: OrgId, slug: &str) -> StorageResult<Option<Service>> {
            self.inner.find_service_by_slug(org, slug)
        }
        fn find_service_by_website(&self, org: OrgId, website: &str) -> StorageResult<Option<Service>> {
            self.inner.find_service_by_website(org, website)
        }
        fn find_service_by_source_url(&self, org: OrgId, url: &str) -> StorageResult<Option<Service>> {
            self.inner.find_service_by_source_url(org, url)
        }
        fn find_service_by_name(&self, fragment: &str) -> StorageResult<Option<Service>> {
            self.inner.find_service_by_name(fragment)
        }
        fn list_services(&self, filter: &ServiceFilter) -> StorageResult<Vec<Service>> {
            self.inner.list_services(filter)
        }
        fn count_services(&self, filter: &ServiceFilter) -> StorageResult<usize> {
            self.inner.count_services(filter)
        }
        fn save_narrative_item(&self, item: &NarrativeItem) -> StorageResult<()> {
            self.inner.save_narrative_item(item)
        }
        fn list_unlinked_narratives(&self, limit: usize) -> StorageResult<Vec<NarrativeItem>> {
            self.inner.list_unlinked_narratives(limit)
        }
        fn save_target_entity(&self, entity: &TargetEntity) -> StorageResult<()> {
            self.inner.save_target_entity(entity)
        }
        fn get_target_entity(&self, id: TargetId) -> StorageResult<Option<TargetEntity>> {
            self.inner.get_target_entity(id)
        }
        fn list_target_entities(&self) -> StorageResult<Vec<TargetEntity>> {
            self.inner.list_target_entities()
        }
        fn update_target_ratings(&self, id: TargetId, r: u8, c: f64) -> StorageResult<()> {
            self.inner.update_target_ratings(id, r, c)
        }
        fn insert_association(&self, association: &Association) -> StorageResult<bool> {
            self.inner.insert_association(association)
        }
        fn count_associations(&self, target: TargetId) -> StorageResult<usize> {
            self.inner.count_associations(target)
        }
        fn list_associations_for_item(&self, item: NarrativeId) -> StorageResult<Vec<Association>> {
            self.inner.list_associations_for_item(item)
        }
        fn save_facility(&self, facility: &Facility) -> StorageResult<()> {
            self.inner.save_facility(facility)
        }
        fn find_facility_by_slug(&self, slug: &str) -> StorageResult<Option<Facility>> {
            self.inner.find_facility_by_slug(slug)
        }
        fn insert_partnership(&self, partnership: &Partnership) -> StorageResult<bool> {
            self.inner.insert_partnership(partnership)
        }
        fn count_partnerships(&self, facility: FacilityId) -> StorageResult<usize> {
            self.inner.count_partnerships(facility)
        }
    }

    // === Scenario: creation race resolved by one re-resolution ===
    #[test]
    fn conflict_is_caught_once_and_re_resolved() {
        let store = RacingStore::new("Sisters Inside (concurrent)");
        let mediator = Mediator::new(&store);

        let outcome = mediator
            .upsert_organization(&org_input("Sisters Inside"), &SourceDescriptor::new("acnc"))
            .unwrap();

        // We lost the race, so the competitor's record is the canonical one
        // and our input was merged into it.
        assert!(!outcome.created);
        let canonical = store.get_organization(outcome.id).unwrap().unwrap();
        assert_eq!(canonical.slug, "sisters-inside");
        assert_eq!(canonical.provenance.len(), 2);
    }
}
