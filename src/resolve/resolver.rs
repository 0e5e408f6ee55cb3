//! Dedup cascade
//!
//! Each lookup runs a fixed-order cascade of exact-match probes and stops at
//! the first hit. The order is semantic, not an optimization: slug, derived
//! from the authoritative display name, is the most stable identity signal
//! across independent sources; website is the second most stable; raw source
//! URL is last because many partners share a domain without sharing an
//! identity.

use crate::catalog::{OrgId, ServiceId};
use crate::storage::{CatalogStore, StorageResult};

/// Identity keys for an organization lookup, already normalized.
#[derive(Debug, Clone)]
pub struct OrgKeys {
    pub slug: String,
    /// Canonical website, only probed when the source supplied one
    pub website: Option<String>,
}

/// Identity keys for a service lookup, scoped to the owning organization.
#[derive(Debug, Clone)]
pub struct ServiceKeys {
    pub slug: String,
    pub website: Option<String>,
    /// Canonical deep link to the external source record
    pub source_url: Option<String>,
}

/// Resolve an organization: slug first, then canonical website.
pub fn resolve_organization(
    store: &dyn CatalogStore,
    keys: &OrgKeys,
) -> StorageResult<Option<OrgId>> {
    if let Some(org) = store.find_organization_by_slug(&keys.slug)? {
        return Ok(Some(org.id));
    }
    if let Some(website) = &keys.website {
        if let Some(org) = store.find_organization_by_website(website)? {
            return Ok(Some(org.id));
        }
    }
    Ok(None)
}

/// Resolve a service within its owning organization: slug, then website,
/// then source URL against prior provenance.
pub fn resolve_service(
    store: &dyn CatalogStore,
    org: OrgId,
    keys: &ServiceKeys,
) -> StorageResult<Option<ServiceId>> {
    if let Some(service) = store.find_service_by_slug(org, &keys.slug)? {
        return Ok(Some(service.id));
    }
    if let Some(website) = &keys.website {
        if let Some(service) = store.find_service_by_website(org, website)? {
            return Ok(Some(service.id));
        }
    }
    if let Some(url) = &keys.source_url {
        if let Some(service) = store.find_service_by_source_url(org, url)? {
            return Ok(Some(service.id));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Organization, OrganizationInput, Service, ServiceInput, SourceDescriptor};
    use crate::storage::MemoryStore;

    fn seed_org(store: &MemoryStore, name: &str, slug: &str, website: Option<&str>) -> OrgId {
        let input = OrganizationInput {
            name: name.to_string(),
            website: website.map(String::from),
            ..Default::default()
        };
        let org = Organization::from_input(&input, slug.to_string(), &SourceDescriptor::new("seed"));
        let id = org.id;
        store.insert_organization(&org).unwrap();
        id
    }

    // === Scenario: slug beats website when both would match different rows ===
    #[test]
    fn slug_probe_runs_before_website_probe() {
        let store = MemoryStore::new();
        let by_slug = seed_org(&store, "Youth Law", "youth-law", None);
        let by_site = seed_org(
            &store,
            "Youth Legal Service",
            "youth-legal-service",
            Some("https://youthlaw.org.au"),
        );

        let keys = OrgKeys {
            slug: "youth-law".to_string(),
            website: Some("https://youthlaw.org.au".to_string()),
        };
        let resolved = resolve_organization(&store, &keys).unwrap();
        assert_eq!(resolved, Some(by_slug));
        assert_ne!(resolved, Some(by_site));
    }

    #[test]
    fn website_probe_skipped_when_not_supplied() {
        let store = MemoryStore::new();
        seed_org(&store, "Youth Law", "youth-law", Some("https://youthlaw.org.au"));

        let keys = OrgKeys {
            slug: "different-name".to_string(),
            website: None,
        };
        assert_eq!(resolve_organization(&store, &keys).unwrap(), None);
    }

    #[test]
    fn service_resolution_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let org_a = seed_org(&store, "Org A", "org-a", None);
        let org_b = seed_org(&store, "Org B", "org-b", None);

        let input = ServiceInput {
            name: "Outreach".to_string(),
            ..Default::default()
        };
        let service = Service::from_input(
            org_a,
            &input,
            "outreach".to_string(),
            &SourceDescriptor::new("seed"),
        );
        store.insert_service(&service).unwrap();

        let keys = ServiceKeys {
            slug: "outreach".to_string(),
            website: None,
            source_url: None,
        };
        assert_eq!(resolve_service(&store, org_a, &keys).unwrap(), Some(service.id));
        assert_eq!(resolve_service(&store, org_b, &keys).unwrap(), None);
    }

    #[test]
    fn source_url_probe_matches_prior_provenance() {
        let store = MemoryStore::new();
        let org = seed_org(&store, "Org", "org", None);

        let input = ServiceInput {
            name: "Court Support".to_string(),
            ..Default::default()
        };
        let source = SourceDescriptor::new("acnc").with_url("https://acnc.gov.au/rec/7");
        let service = Service::from_input(org, &input, "court-support".to_string(), &source);
        store.insert_service(&service).unwrap();

        let keys = ServiceKeys {
            slug: "renamed-listing".to_string(),
            website: None,
            source_url: Some("https://acnc.gov.au/rec/7".to_string()),
        };
        assert_eq!(resolve_service(&store, org, &keys).unwrap(), Some(service.id));
    }
}
