//! Organizations and the services they own

use super::provenance::{append_deduped, ProvenanceEntry, SourceDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(Uuid);

impl OrgId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for OrgId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Uuid);

impl ServiceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verification workflow state for a service.
///
/// Everything enters as `Pending`; verification itself happens outside this
/// core, which only reads the status back out through export filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    Unverified,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Unverified => "unverified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "unverified" => Some(Self::Unverified),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incoming organization description from a source system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationInput {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Incoming service description from a source system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// A canonical organization record, the survivor of deduplication.
///
/// Invariant: `slug` is unique across all organizations; `website`, when
/// present, is unique too. Created on the first resolution miss, merged on
/// every subsequent hit, never deleted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub slug: String,
    pub website: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub provenance: Vec<ProvenanceEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn from_input(input: &OrganizationInput, slug: String, source: &SourceDescriptor) -> Self {
        let now = Utc::now();
        Self {
            id: OrgId::new(),
            name: input.name.clone(),
            slug,
            website: non_empty(&input.website),
            email: non_empty(&input.email),
            phone: non_empty(&input.phone),
            description: non_empty(&input.description),
            state: non_empty(&input.state),
            city: non_empty(&input.city),
            provenance: vec![ProvenanceEntry::new(source.clone())],
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge an incoming description into this canonical record.
    ///
    /// A non-empty incoming value replaces the stored one; an empty or
    /// absent value never erases existing data. The source is appended to
    /// provenance unless its `(system, record_id)` key is already present.
    /// Returns whether anything changed.
    pub fn merge(&mut self, input: &OrganizationInput, source: &SourceDescriptor) -> bool {
        let mut changed = false;
        changed |= merge_field(&mut self.website, &input.website);
        changed |= merge_field(&mut self.email, &input.email);
        changed |= merge_field(&mut self.phone, &input.phone);
        changed |= merge_field(&mut self.description, &input.description);
        changed |= merge_field(&mut self.state, &input.state);
        changed |= merge_field(&mut self.city, &input.city);
        if !input.name.trim().is_empty() && input.name != self.name {
            self.name = input.name.clone();
            changed = true;
        }
        changed |= append_deduped(&mut self.provenance, source);
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

/// A canonical service record, owned by exactly one organization.
///
/// Invariant: `slug` is unique within the owning organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub organization_id: OrgId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub website: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    /// Deep link to the source record this service was first ingested from
    pub source_url: Option<String>,
    pub verification_status: VerificationStatus,
    pub provenance: Vec<ProvenanceEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn from_input(
        organization_id: OrgId,
        input: &ServiceInput,
        slug: String,
        source: &SourceDescriptor,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ServiceId::new(),
            organization_id,
            name: input.name.clone(),
            slug,
            description: non_empty(&input.description),
            category: non_empty(&input.category),
            website: non_empty(&input.website),
            contact_email: non_empty(&input.contact_email),
            contact_phone: non_empty(&input.contact_phone),
            state: non_empty(&input.state),
            city: non_empty(&input.city),
            source_url: source.url.clone().or_else(|| non_empty(&input.website)),
            verification_status: VerificationStatus::Pending,
            provenance: vec![ProvenanceEntry::new(source.clone())],
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge an incoming description, same rules as [`Organization::merge`].
    pub fn merge(&mut self, input: &ServiceInput, source: &SourceDescriptor) -> bool {
        let mut changed = false;
        changed |= merge_field(&mut self.description, &input.description);
        changed |= merge_field(&mut self.category, &input.category);
        changed |= merge_field(&mut self.website, &input.website);
        changed |= merge_field(&mut self.contact_email, &input.contact_email);
        changed |= merge_field(&mut self.contact_phone, &input.contact_phone);
        changed |= merge_field(&mut self.state, &input.state);
        changed |= merge_field(&mut self.city, &input.city);
        if !input.name.trim().is_empty() && input.name != self.name {
            self.name = input.name.clone();
            changed = true;
        }
        changed |= append_deduped(&mut self.provenance, source);
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Apply the never-overwrite-with-empty merge rule to one field.
fn merge_field(current: &mut Option<String>, incoming: &Option<String>) -> bool {
    match non_empty(incoming) {
        Some(value) if current.as_deref() != Some(value.as_str()) => {
            *current = Some(value);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org_input(name: &str) -> OrganizationInput {
        OrganizationInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn source(system: &str) -> SourceDescriptor {
        SourceDescriptor::new(system)
    }

    // === Scenario: empty incoming value never erases stored data ===
    #[test]
    fn merge_never_overwrites_nonempty_with_empty() {
        let mut input = org_input("Sisters Inside");
        input.website = Some("https://sistersinside.com.au".to_string());
        let mut org = Organization::from_input(&input, "sisters-inside".into(), &source("acnc"));

        let mut sparse = org_input("Sisters Inside");
        sparse.website = Some("   ".to_string());
        org.merge(&sparse, &source("askizzy"));

        assert_eq!(org.website.as_deref(), Some("https://sistersinside.com.au"));
    }

    #[test]
    fn merge_fills_missing_fields() {
        let mut org =
            Organization::from_input(&org_input("Sisters Inside"), "sisters-inside".into(), &source("acnc"));
        assert!(org.email.is_none());

        let mut richer = org_input("Sisters Inside");
        richer.email = Some("admin@sistersinside.com.au".to_string());
        assert!(org.merge(&richer, &source("askizzy")));

        assert_eq!(org.email.as_deref(), Some("admin@sistersinside.com.au"));
        assert_eq!(org.provenance.len(), 2);
    }

    #[test]
    fn merge_same_source_twice_keeps_one_provenance_entry() {
        let mut org =
            Organization::from_input(&org_input("Sisters Inside"), "sisters-inside".into(), &source("acnc"));
        let repeat = source("acnc");
        org.merge(&org_input("Sisters Inside"), &repeat);
        org.merge(&org_input("Sisters Inside"), &repeat);
        assert_eq!(org.provenance.len(), 1);
    }

    #[test]
    fn service_defaults_to_pending() {
        let input = ServiceInput {
            name: "Court Support".to_string(),
            ..Default::default()
        };
        let svc = Service::from_input(OrgId::new(), &input, "court-support".into(), &source("acnc"));
        assert_eq!(svc.verification_status, VerificationStatus::Pending);
    }

    #[test]
    fn service_source_url_falls_back_to_website() {
        let input = ServiceInput {
            name: "Court Support".to_string(),
            website: Some("https://example.org/court".to_string()),
            ..Default::default()
        };
        let svc = Service::from_input(OrgId::new(), &input, "court-support".into(), &source("acnc"));
        assert_eq!(svc.source_url.as_deref(), Some("https://example.org/court"));

        let sourced = source("acnc").with_url("https://acnc.gov.au/rec/1");
        let svc = Service::from_input(OrgId::new(), &input, "court-support".into(), &sourced);
        assert_eq!(svc.source_url.as_deref(), Some("https://acnc.gov.au/rec/1"));
    }
}
