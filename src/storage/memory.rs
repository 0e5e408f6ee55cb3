//! In-memory catalog store
//!
//! Implements the same `CatalogStore` contract as the SQLite backend,
//! including the uniqueness invariants and their `Conflict` reporting, so
//! tests and embedders can substitute it without changing resolve-layer
//! behavior.

use super::traits::{CatalogStore, ServiceFilter, StorageError, StorageResult};
use crate::catalog::{
    Association, Facility, FacilityId, NarrativeId, NarrativeItem, Organization, OrgId,
    Partnership, Service, ServiceId, TargetEntity, TargetId,
};
use dashmap::DashMap;
use std::sync::Mutex;

/// DashMap-backed store for tests and in-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    orgs: DashMap<OrgId, Organization>,
    services: DashMap<ServiceId, Service>,
    narratives: DashMap<NarrativeId, NarrativeItem>,
    /// Insertion order for narratives; DashMap iteration order is arbitrary.
    narrative_order: Mutex<Vec<NarrativeId>>,
    targets: DashMap<TargetId, TargetEntity>,
    target_order: Mutex<Vec<TargetId>>,
    associations: DashMap<(NarrativeId, TargetId), Association>,
    facilities: DashMap<FacilityId, Facility>,
    partnerships: DashMap<(FacilityId, String, String), Partnership>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(service: &Service, filter: &ServiceFilter) -> bool {
    if let Some(source) = &filter.source_system {
        let first = service.provenance.first().map(|p| p.source.system.as_str());
        if first != Some(source.as_str()) {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if service.verification_status != status {
            return false;
        }
    }
    true
}

impl CatalogStore for MemoryStore {
    fn insert_organization(&self, org: &Organization) -> StorageResult<()> {
        let taken = self.orgs.iter().any(|existing| {
            existing.slug == org.slug
                || (org.website.is_some() && existing.website == org.website)
        });
        if taken {
            return Err(StorageError::Conflict("organizations.slug/website".into()));
        }
        self.orgs.insert(org.id, org.clone());
        Ok(())
    }

    fn update_organization(&self, org: &Organization) -> StorageResult<()> {
        if !self.orgs.contains_key(&org.id) {
            return Err(StorageError::NotFound(format!("organization {}", org.id)));
        }
        self.orgs.insert(org.id, org.clone());
        Ok(())
    }

    fn get_organization(&self, id: OrgId) -> StorageResult<Option<Organization>> {
        Ok(self.orgs.get(&id).map(|r| r.clone()))
    }

    fn find_organization_by_slug(&self, slug: &str) -> StorageResult<Option<Organization>> {
        Ok(self
            .orgs
            .iter()
            .find(|o| o.slug == slug)
            .map(|o| o.clone()))
    }

    fn find_organization_by_website(&self, website: &str) -> StorageResult<Option<Organization>> {
        Ok(self
            .orgs
            .iter()
            .find(|o| o.website.as_deref() == Some(website))
            .map(|o| o.clone()))
    }

    fn find_organization_by_name(&self, fragment: &str) -> StorageResult<Option<Organization>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .orgs
            .iter()
            .find(|o| o.name.to_lowercase().contains(&needle))
            .map(|o| o.clone()))
    }

    fn insert_service(&self, service: &Service) -> StorageResult<()> {
        let taken = self.services.iter().any(|existing| {
            existing.organization_id == service.organization_id && existing.slug == service.slug
        });
        if taken {
            return Err(StorageError::Conflict("services.organization_id/slug".into()));
        }
        self.services.insert(service.id, service.clone());
        Ok(())
    }

    fn update_service(&self, service: &Service) -> StorageResult<()> {
        if !self.services.contains_key(&service.id) {
            return Err(StorageError::NotFound(format!("service {}", service.id)));
        }
        self.services.insert(service.id, service.clone());
        Ok(())
    }

    fn get_service(&self, id: ServiceId) -> StorageResult<Option<Service>> {
        Ok(self.services.get(&id).map(|r| r.clone()))
    }

    fn find_service_by_slug(&self, org: OrgId, slug: &str) -> StorageResult<Option<Service>> {
        Ok(self
            .services
            .iter()
            .find(|s| s.organization_id == org && s.slug == slug)
            .map(|s| s.clone()))
    }

    fn find_service_by_website(&self, org: OrgId, website: &str) -> StorageResult<Option<Service>> {
        Ok(self
            .services
            .iter()
            .find(|s| s.organization_id == org && s.website.as_deref() == Some(website))
            .map(|s| s.clone()))
    }

    fn find_service_by_source_url(&self, org: OrgId, url: &str) -> StorageResult<Option<Service>> {
        Ok(self
            .services
            .iter()
            .find(|s| s.organization_id == org && s.source_url.as_deref() == Some(url))
            .map(|s| s.clone()))
    }

    fn find_service_by_name(&self, fragment: &str) -> StorageResult<Option<Service>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .services
            .iter()
            .find(|s| s.name.to_lowercase().contains(&needle))
            .map(|s| s.clone()))
    }

    fn list_services(&self, filter: &ServiceFilter) -> StorageResult<Vec<Service>> {
        let mut matching: Vec<Service> = self
            .services
            .iter()
            .filter(|s| matches_filter(s, filter))
            .map(|s| s.clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(filter.offset())
            .take(filter.limit)
            .collect())
    }

    fn count_services(&self, filter: &ServiceFilter) -> StorageResult<usize> {
        Ok(self
            .services
            .iter()
            .filter(|s| matches_filter(s, filter))
            .count())
    }

    fn save_narrative_item(&self, item: &NarrativeItem) -> StorageResult<()> {
        if self.narratives.insert(item.id, item.clone()).is_none() {
            let mut order = self
                .narrative_order
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            order.push(item.id);
        }
        Ok(())
    }

    fn list_unlinked_narratives(&self, limit: usize) -> StorageResult<Vec<NarrativeItem>> {
        let order = self
            .narrative_order
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut items = Vec::new();
        for id in order.iter() {
            if items.len() >= limit {
                break;
            }
            let linked = self.associations.iter().any(|a| a.key().0 == *id);
            if linked {
                continue;
            }
            if let Some(item) = self.narratives.get(id) {
                items.push(item.clone());
            }
        }
        Ok(items)
    }

    fn save_target_entity(&self, entity: &TargetEntity) -> StorageResult<()> {
        if self.targets.insert(entity.id, entity.clone()).is_none() {
            let mut order = self
                .target_order
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            order.push(entity.id);
        }
        Ok(())
    }

    fn get_target_entity(&self, id: TargetId) -> StorageResult<Option<TargetEntity>> {
        Ok(self.targets.get(&id).map(|r| r.clone()))
    }

    fn list_target_entities(&self) -> StorageResult<Vec<TargetEntity>> {
        let order = self
            .target_order
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(order
            .iter()
            .filter_map(|id| self.targets.get(id).map(|t| t.clone()))
            .collect())
    }

    fn update_target_ratings(
        &self,
        id: TargetId,
        narrative_rating: u8,
        composite_index: f64,
    ) -> StorageResult<()> {
        match self.targets.get_mut(&id) {
            Some(mut entity) => {
                entity.narrative_rating = narrative_rating;
                entity.composite_index = composite_index;
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("target entity {}", id))),
        }
    }

    fn insert_association(&self, association: &Association) -> StorageResult<bool> {
        let key = (association.source_item_id, association.target_entity_id);
        if self.associations.contains_key(&key) {
            return Ok(false);
        }
        self.associations.insert(key, association.clone());
        Ok(true)
    }

    fn count_associations(&self, target: TargetId) -> StorageResult<usize> {
        Ok(self
            .associations
            .iter()
            .filter(|a| a.key().1 == target)
            .count())
    }

    fn list_associations_for_item(&self, item: NarrativeId) -> StorageResult<Vec<Association>> {
        Ok(self
            .associations
            .iter()
            .filter(|a| a.key().0 == item)
            .map(|a| a.clone())
            .collect())
    }

    fn save_facility(&self, facility: &Facility) -> StorageResult<()> {
        self.facilities.insert(facility.id, facility.clone());
        Ok(())
    }

    fn find_facility_by_slug(&self, slug: &str) -> StorageResult<Option<Facility>> {
        Ok(self
            .facilities
            .iter()
            .find(|f| f.slug == slug)
            .map(|f| f.clone()))
    }

    fn insert_partnership(&self, partnership: &Partnership) -> StorageResult<bool> {
        let key = (
            partnership.facility_id,
            partnership.partner.kind().to_string(),
            partnership.partner.id_string(),
        );
        if self.partnerships.contains_key(&key) {
            return Ok(false);
        }
        self.partnerships.insert(key, partnership.clone());
        Ok(true)
    }

    fn count_partnerships(&self, facility: FacilityId) -> StorageResult<usize> {
        Ok(self
            .partnerships
            .iter()
            .filter(|p| p.key().0 == facility)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OrganizationInput, SourceDescriptor};

    fn org(name: &str, slug: &str) -> Organization {
        let input = OrganizationInput {
            name: name.to_string(),
            ..Default::default()
        };
        Organization::from_input(&input, slug.to_string(), &SourceDescriptor::new("test"))
    }

    // The memory store must report conflicts the same way SQLite does,
    // or the mediator's retry path diverges between tests and production.
    #[test]
    fn slug_conflict_matches_sqlite_behavior() {
        let store = MemoryStore::new();
        store.insert_organization(&org("A", "same")).unwrap();
        let err = store.insert_organization(&org("B", "same")).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn unlinked_narratives_preserve_insertion_order() {
        let store = MemoryStore::new();
        for title in ["first", "second", "third"] {
            store
                .save_narrative_item(&NarrativeItem {
                    id: NarrativeId::new(),
                    title: title.to_string(),
                    body: String::new(),
                    themes: vec![],
                    origin_organization: None,
                    origin_location: None,
                })
                .unwrap();
        }
        let items = store.list_unlinked_narratives(2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "first");
        assert_eq!(items[1].title, "second");
    }
}
