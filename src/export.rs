//! Service export
//!
//! Pure query-and-format: filter by source system and verification status,
//! paginate, and emit either structured records (JSON) or a flattened CSV.
//! Access control belongs to whatever transport fronts this; nothing here
//! checks credentials.

use crate::catalog::Service;
use crate::storage::{CatalogStore, ServiceFilter, StorageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One flattened export row: the service plus its owner's display fields.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRecord {
    pub id: String,
    pub organization_id: String,
    pub organization_name: String,
    pub name: String,
    pub slug: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub source_url: Option<String>,
    pub source_system: Option<String>,
    pub verification_status: String,
    pub created_at: DateTime<Utc>,
}

impl ExportRecord {
    fn from_service(service: Service, organization_name: String) -> Self {
        let source_system = service
            .provenance
            .first()
            .map(|entry| entry.source.system.clone());
        Self {
            id: service.id.to_string(),
            organization_id: service.organization_id.to_string(),
            organization_name,
            name: service.name,
            slug: service.slug,
            category: service.category,
            description: service.description,
            website: service.website,
            contact_email: service.contact_email,
            contact_phone: service.contact_phone,
            state: service.state,
            city: service.city,
            source_url: service.source_url,
            source_system,
            verification_status: service.verification_status.to_string(),
            created_at: service.created_at,
        }
    }
}

/// One page of export records with pagination metadata.
#[derive(Debug, Serialize)]
pub struct ExportPage {
    pub records: Vec<ExportRecord>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl ExportPage {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.limit.max(1))
    }
}

/// Run the export query for one page.
pub fn export_services(store: &dyn CatalogStore, filter: &ServiceFilter) -> StorageResult<ExportPage> {
    let total = store.count_services(filter)?;
    let services = store.list_services(filter)?;

    let mut records = Vec::with_capacity(services.len());
    for service in services {
        let organization_name = store
            .get_organization(service.organization_id)?
            .map(|org| org.name)
            .unwrap_or_default();
        records.push(ExportRecord::from_service(service, organization_name));
    }

    Ok(ExportPage {
        records,
        total,
        page: filter.page,
        limit: filter.limit,
    })
}

const CSV_HEADER: &str = "id,organization_id,organization_name,name,slug,category,description,\
                          website,contact_email,contact_phone,state,city,source_url,source_system,\
                          verification_status,created_at";

/// Render a page as CSV. A field is quoted only when it contains a comma,
/// a quote, or a newline; embedded quotes are doubled.
pub fn to_csv(page: &ExportPage) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for record in &page.records {
        let fields = [
            record.id.as_str(),
            record.organization_id.as_str(),
            record.organization_name.as_str(),
            record.name.as_str(),
            record.slug.as_str(),
            record.category.as_deref().unwrap_or(""),
            record.description.as_deref().unwrap_or(""),
            record.website.as_deref().unwrap_or(""),
            record.contact_email.as_deref().unwrap_or(""),
            record.contact_phone.as_deref().unwrap_or(""),
            record.state.as_deref().unwrap_or(""),
            record.city.as_deref().unwrap_or(""),
            record.source_url.as_deref().unwrap_or(""),
            record.source_system.as_deref().unwrap_or(""),
            record.verification_status.as_str(),
        ];
        let mut row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        row.push(record.created_at.to_rfc3339());
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OrganizationInput, ServiceInput, SourceDescriptor, VerificationStatus};
    use crate::ingest::{ingest, IngestRequest};
    use crate::storage::MemoryStore;

    fn seed(store: &MemoryStore, system: &str, org: &str, service: &str) {
        let request = IngestRequest {
            source: SourceDescriptor::new(system),
            organization: OrganizationInput {
                name: org.to_string(),
                ..Default::default()
            },
            service: ServiceInput {
                name: service.to_string(),
                ..Default::default()
            },
        };
        ingest(store, &request).unwrap();
    }

    #[test]
    fn filters_by_source_system() {
        let store = MemoryStore::new();
        seed(&store, "acnc", "Org A", "Service A");
        seed(&store, "askizzy", "Org B", "Service B");

        let page = export_services(&store, &ServiceFilter::new().with_source("acnc")).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].name, "Service A");
        assert_eq!(page.records[0].organization_name, "Org A");
        assert_eq!(page.records[0].source_system.as_deref(), Some("acnc"));
    }

    #[test]
    fn everything_starts_pending() {
        let store = MemoryStore::new();
        seed(&store, "acnc", "Org A", "Service A");

        let pending = export_services(
            &store,
            &ServiceFilter::new().with_status(VerificationStatus::Pending),
        )
        .unwrap();
        let verified = export_services(
            &store,
            &ServiceFilter::new().with_status(VerificationStatus::Verified),
        )
        .unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(verified.total, 0);
    }

    #[test]
    fn pagination_reports_totals_across_pages() {
        let store = MemoryStore::new();
        for i in 0..5 {
            seed(&store, "acnc", "Org", &format!("Service {i}"));
        }

        let filter = ServiceFilter::new().with_limit(2).with_page(3);
        let page = export_services(&store, &filter).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.page_count(), 3);
    }

    // === Scenario: CSV quoting rules from the flattened format ===
    #[test]
    fn csv_quotes_only_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn csv_round_trips_awkward_names() {
        let store = MemoryStore::new();
        seed(&store, "acnc", "Smith, Jones & Co", "Bail Support");

        let page = export_services(&store, &ServiceFilter::new()).unwrap();
        let csv = to_csv(&page);
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("id,organization_id,organization_name"));
        assert!(lines.next().unwrap().contains("\"Smith, Jones & Co\""));
    }
}
