//! SQLite storage backend for Conflux

use super::traits::{CatalogStore, OpenStore, ServiceFilter, StorageError, StorageResult};
use crate::catalog::{
    Association, Facility, FacilityId, NarrativeId, NarrativeItem, OperationalStatus,
    Organization, OrgId, Partnership, PartnerRef, Service, ServiceId, TargetEntity, TargetId,
    VerificationStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed catalog store
///
/// Single database file, one table per entity kind. The uniqueness
/// invariants are expressed as UNIQUE constraints and composite primary
/// keys, so a creation race surfaces as a constraint violation which is
/// mapped to `StorageError::Conflict` for the resolve layer.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                website TEXT UNIQUE,
                email TEXT,
                phone TEXT,
                description TEXT,
                state TEXT,
                city TEXT,
                provenance_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                name TEXT NOT NULL,
                slug TEXT NOT NULL,
                description TEXT,
                category TEXT,
                website TEXT,
                contact_email TEXT,
                contact_phone TEXT,
                state TEXT,
                city TEXT,
                source_url TEXT,
                verification_status TEXT NOT NULL,
                data_source TEXT,
                provenance_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (organization_id, slug),
                FOREIGN KEY (organization_id) REFERENCES organizations(id)
            );

            CREATE INDEX IF NOT EXISTS idx_services_org
                ON services(organization_id);
            CREATE INDEX IF NOT EXISTS idx_services_data_source
                ON services(data_source);
            CREATE INDEX IF NOT EXISTS idx_services_status
                ON services(verification_status);

            CREATE TABLE IF NOT EXISTS narrative_items (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                themes_json TEXT NOT NULL,
                origin_organization TEXT,
                origin_location TEXT
            );

            CREATE TABLE IF NOT EXISTS target_entities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                geography_json TEXT NOT NULL,
                evidence_score REAL,
                authority_score REAL,
                narrative_rating INTEGER NOT NULL DEFAULT 0,
                composite_index REAL NOT NULL DEFAULT 0
            );

            -- One association per (source item, target) pair; duplicate
            -- inserts are silently ignored at the call site.
            CREATE TABLE IF NOT EXISTS associations (
                source_item_id TEXT NOT NULL,
                target_entity_id TEXT NOT NULL,
                link_type TEXT NOT NULL,
                score INTEGER NOT NULL,
                PRIMARY KEY (source_item_id, target_entity_id)
            );

            CREATE INDEX IF NOT EXISTS idx_associations_target
                ON associations(target_entity_id);

            CREATE TABLE IF NOT EXISTS facilities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                state TEXT,
                operational_status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS facility_partnerships (
                facility_id TEXT NOT NULL,
                partner_kind TEXT NOT NULL,
                partner_id TEXT NOT NULL,
                partnership_type TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                description TEXT,
                PRIMARY KEY (facility_id, partner_kind, partner_id)
            );

            PRAGMA foreign_keys = ON;

            -- WAL for concurrent reads during batch writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&conn)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Map a constraint violation on insert to `Conflict`; pass everything
/// else through as a database error.
fn map_insert_err(entity: &str, err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StorageError::Conflict(entity.to_string())
        }
        _ => StorageError::Database(err),
    }
}

fn parse_datetime(raw: String) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(format!("{}: {}", raw, e)))
}

const ORG_COLUMNS: &str = "id, name, slug, website, email, phone, description, state, city, \
                           provenance_json, created_at, updated_at";

fn org_from_row(row: &Row<'_>) -> rusqlite::Result<(Organization, String, String)> {
    let id: String = row.get(0)?;
    let provenance_json: String = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    let org = Organization {
        id: OrgId::parse(&id).unwrap_or_default(),
        name: row.get(1)?,
        slug: row.get(2)?,
        website: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        description: row.get(6)?,
        state: row.get(7)?,
        city: row.get(8)?,
        provenance: serde_json::from_str(&provenance_json).unwrap_or_default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    Ok((org, created_at, updated_at))
}

fn finish_org(parts: (Organization, String, String)) -> StorageResult<Organization> {
    let (mut org, created_at, updated_at) = parts;
    org.created_at = parse_datetime(created_at)?;
    org.updated_at = parse_datetime(updated_at)?;
    Ok(org)
}

const SERVICE_COLUMNS: &str = "id, organization_id, name, slug, description, category, website, \
                               contact_email, contact_phone, state, city, source_url, \
                               verification_status, provenance_json, created_at, updated_at";

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<(Service, String, String)> {
    let id: String = row.get(0)?;
    let org_id: String = row.get(1)?;
    let status: String = row.get(12)?;
    let provenance_json: String = row.get(13)?;
    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;

    let service = Service {
        id: ServiceId::parse(&id).unwrap_or_default(),
        organization_id: OrgId::parse(&org_id).unwrap_or_default(),
        name: row.get(2)?,
        slug: row.get(3)?,
        description: row.get(4)?,
        category: row.get(5)?,
        website: row.get(6)?,
        contact_email: row.get(7)?,
        contact_phone: row.get(8)?,
        state: row.get(9)?,
        city: row.get(10)?,
        source_url: row.get(11)?,
        verification_status: VerificationStatus::parse(&status)
            .unwrap_or(VerificationStatus::Pending),
        provenance: serde_json::from_str(&provenance_json).unwrap_or_default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    Ok((service, created_at, updated_at))
}

fn finish_service(parts: (Service, String, String)) -> StorageResult<Service> {
    let (mut service, created_at, updated_at) = parts;
    service.created_at = parse_datetime(created_at)?;
    service.updated_at = parse_datetime(updated_at)?;
    Ok(service)
}

/// The source system a service was first ingested from, used for filtering.
fn data_source(service: &Service) -> Option<&str> {
    service.provenance.first().map(|p| p.source.system.as_str())
}

/// WHERE clause and parameters for a service filter.
fn filter_clause(filter: &ServiceFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(source) = &filter.source_system {
        clauses.push("data_source = ?");
        params.push(source.clone());
    }
    if let Some(status) = filter.status {
        clauses.push("verification_status = ?");
        params.push(status.as_str().to_string());
    }
    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (clause, params)
}

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<TargetEntity> {
    let id: String = row.get(0)?;
    let geography_json: String = row.get(4)?;
    Ok(TargetEntity {
        id: TargetId::parse(&id).unwrap_or_default(),
        name: row.get(1)?,
        description: row.get(2)?,
        entity_type: row.get(3)?,
        geography: serde_json::from_str(&geography_json).unwrap_or_default(),
        evidence_score: row.get(5)?,
        authority_score: row.get(6)?,
        narrative_rating: row.get::<_, i64>(7)? as u8,
        composite_index: row.get(8)?,
    })
}

impl CatalogStore for SqliteStore {
    fn insert_organization(&self, org: &Organization) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO organizations (id, name, slug, website, email, phone, description, \
                 state, city, provenance_json, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    org.id.to_string(),
                    org.name,
                    org.slug,
                    org.website,
                    org.email,
                    org.phone,
                    org.description,
                    org.state,
                    org.city,
                    serde_json::to_string(&org.provenance)?,
                    org.created_at.to_rfc3339(),
                    org.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_insert_err("organizations.slug/website", e))?;
            Ok(())
        })
    }

    fn update_organization(&self, org: &Organization) -> StorageResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE organizations SET name = ?2, website = ?3, email = ?4, phone = ?5, \
                 description = ?6, state = ?7, city = ?8, provenance_json = ?9, updated_at = ?10 \
                 WHERE id = ?1",
                params![
                    org.id.to_string(),
                    org.name,
                    org.website,
                    org.email,
                    org.phone,
                    org.description,
                    org.state,
                    org.city,
                    serde_json::to_string(&org.provenance)?,
                    org.updated_at.to_rfc3339(),
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("organization {}", org.id)));
            }
            Ok(())
        })
    }

    fn get_organization(&self, id: OrgId) -> StorageResult<Option<Organization>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM organizations WHERE id = ?1", ORG_COLUMNS),
                params![id.to_string()],
                org_from_row,
            )
            .optional()?
            .map(finish_org)
            .transpose()
        })
    }

    fn find_organization_by_slug(&self, slug: &str) -> StorageResult<Option<Organization>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM organizations WHERE slug = ?1", ORG_COLUMNS),
                params![slug],
                org_from_row,
            )
            .optional()?
            .map(finish_org)
            .transpose()
        })
    }

    fn find_organization_by_website(&self, website: &str) -> StorageResult<Option<Organization>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM organizations WHERE website = ?1", ORG_COLUMNS),
                params![website],
                org_from_row,
            )
            .optional()?
            .map(finish_org)
            .transpose()
        })
    }

    fn find_organization_by_name(&self, fragment: &str) -> StorageResult<Option<Organization>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM organizations \
                     WHERE LOWER(name) LIKE '%' || LOWER(?1) || '%' LIMIT 1",
                    ORG_COLUMNS
                ),
                params![fragment],
                org_from_row,
            )
            .optional()?
            .map(finish_org)
            .transpose()
        })
    }

    fn insert_service(&self, service: &Service) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO services (id, organization_id, name, slug, description, category, \
                 website, contact_email, contact_phone, state, city, source_url, \
                 verification_status, data_source, provenance_json, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    service.id.to_string(),
                    service.organization_id.to_string(),
                    service.name,
                    service.slug,
                    service.description,
                    service.category,
                    service.website,
                    service.contact_email,
                    service.contact_phone,
                    service.state,
                    service.city,
                    service.source_url,
                    service.verification_status.as_str(),
                    data_source(service),
                    serde_json::to_string(&service.provenance)?,
                    service.created_at.to_rfc3339(),
                    service.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_insert_err("services.organization_id/slug", e))?;
            Ok(())
        })
    }

    fn update_service(&self, service: &Service) -> StorageResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE services SET name = ?2, description = ?3, category = ?4, website = ?5, \
                 contact_email = ?6, contact_phone = ?7, state = ?8, city = ?9, source_url = ?10, \
                 verification_status = ?11, provenance_json = ?12, updated_at = ?13 \
                 WHERE id = ?1",
                params![
                    service.id.to_string(),
                    service.name,
                    service.description,
                    service.category,
                    service.website,
                    service.contact_email,
                    service.contact_phone,
                    service.state,
                    service.city,
                    service.source_url,
                    service.verification_status.as_str(),
                    serde_json::to_string(&service.provenance)?,
                    service.updated_at.to_rfc3339(),
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("service {}", service.id)));
            }
            Ok(())
        })
    }

    fn get_service(&self, id: ServiceId) -> StorageResult<Option<Service>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM services WHERE id = ?1", SERVICE_COLUMNS),
                params![id.to_string()],
                service_from_row,
            )
            .optional()?
            .map(finish_service)
            .transpose()
        })
    }

    fn find_service_by_slug(&self, org: OrgId, slug: &str) -> StorageResult<Option<Service>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM services WHERE organization_id = ?1 AND slug = ?2",
                    SERVICE_COLUMNS
                ),
                params![org.to_string(), slug],
                service_from_row,
            )
            .optional()?
            .map(finish_service)
            .transpose()
        })
    }

    fn find_service_by_website(&self, org: OrgId, website: &str) -> StorageResult<Option<Service>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM services WHERE organization_id = ?1 AND website = ?2",
                    SERVICE_COLUMNS
                ),
                params![org.to_string(), website],
                service_from_row,
            )
            .optional()?
            .map(finish_service)
            .transpose()
        })
    }

    fn find_service_by_source_url(&self, org: OrgId, url: &str) -> StorageResult<Option<Service>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM services WHERE organization_id = ?1 AND source_url = ?2",
                    SERVICE_COLUMNS
                ),
                params![org.to_string(), url],
                service_from_row,
            )
            .optional()?
            .map(finish_service)
            .transpose()
        })
    }

    fn find_service_by_name(&self, fragment: &str) -> StorageResult<Option<Service>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM services \
                     WHERE LOWER(name) LIKE '%' || LOWER(?1) || '%' LIMIT 1",
                    SERVICE_COLUMNS
                ),
                params![fragment],
                service_from_row,
            )
            .optional()?
            .map(finish_service)
            .transpose()
        })
    }

    fn list_services(&self, filter: &ServiceFilter) -> StorageResult<Vec<Service>> {
        self.with_conn(|conn| {
            let (clause, filter_params) = filter_clause(filter);
            let sql = format!(
                "SELECT {} FROM services{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
                SERVICE_COLUMNS,
                clause,
                filter.limit,
                filter.offset()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(filter_params.iter()),
                service_from_row,
            )?;
            let mut services = Vec::new();
            for row in rows {
                services.push(finish_service(row?)?);
            }
            Ok(services)
        })
    }

    fn count_services(&self, filter: &ServiceFilter) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let (clause, filter_params) = filter_clause(filter);
            let sql = format!("SELECT COUNT(*) FROM services{}", clause);
            let count: i64 = conn.query_row(
                &sql,
                rusqlite::params_from_iter(filter_params.iter()),
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    fn save_narrative_item(&self, item: &NarrativeItem) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO narrative_items \
                 (id, title, body, themes_json, origin_organization, origin_location) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.id.to_string(),
                    item.title,
                    item.body,
                    serde_json::to_string(&item.themes)?,
                    item.origin_organization,
                    item.origin_location,
                ],
            )?;
            Ok(())
        })
    }

    fn list_unlinked_narratives(&self, limit: usize) -> StorageResult<Vec<NarrativeItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, body, themes_json, origin_organization, origin_location \
                 FROM narrative_items n \
                 WHERE NOT EXISTS \
                   (SELECT 1 FROM associations a WHERE a.source_item_id = n.id) \
                 ORDER BY rowid LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                let id: String = row.get(0)?;
                let themes_json: String = row.get(3)?;
                Ok(NarrativeItem {
                    id: NarrativeId::parse(&id).unwrap_or_default(),
                    title: row.get(1)?,
                    body: row.get(2)?,
                    themes: serde_json::from_str(&themes_json).unwrap_or_default(),
                    origin_organization: row.get(4)?,
                    origin_location: row.get(5)?,
                })
            })?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
    }

    fn save_target_entity(&self, entity: &TargetEntity) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO target_entities \
                 (id, name, description, entity_type, geography_json, evidence_score, \
                  authority_score, narrative_rating, composite_index) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entity.id.to_string(),
                    entity.name,
                    entity.description,
                    entity.entity_type,
                    serde_json::to_string(&entity.geography)?,
                    entity.evidence_score,
                    entity.authority_score,
                    entity.narrative_rating as i64,
                    entity.composite_index,
                ],
            )?;
            Ok(())
        })
    }

    fn get_target_entity(&self, id: TargetId) -> StorageResult<Option<TargetEntity>> {
        self.with_conn(|conn| {
            let entity = conn
                .query_row(
                    "SELECT id, name, description, entity_type, geography_json, evidence_score, \
                     authority_score, narrative_rating, composite_index \
                     FROM target_entities WHERE id = ?1",
                    params![id.to_string()],
                    target_from_row,
                )
                .optional()?;
            Ok(entity)
        })
    }

    fn list_target_entities(&self) -> StorageResult<Vec<TargetEntity>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, entity_type, geography_json, evidence_score, \
                 authority_score, narrative_rating, composite_index \
                 FROM target_entities ORDER BY rowid",
            )?;
            let rows = stmt.query_map([], target_from_row)?;
            let mut entities = Vec::new();
            for row in rows {
                entities.push(row?);
            }
            Ok(entities)
        })
    }

    fn update_target_ratings(
        &self,
        id: TargetId,
        narrative_rating: u8,
        composite_index: f64,
    ) -> StorageResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE target_entities SET narrative_rating = ?2, composite_index = ?3 \
                 WHERE id = ?1",
                params![id.to_string(), narrative_rating as i64, composite_index],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(format!("target entity {}", id)));
            }
            Ok(())
        })
    }

    fn insert_association(&self, association: &Association) -> StorageResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO associations \
                 (source_item_id, target_entity_id, link_type, score) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    association.source_item_id.to_string(),
                    association.target_entity_id.to_string(),
                    association.link_type,
                    association.score,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn count_associations(&self, target: TargetId) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM associations WHERE target_entity_id = ?1",
                params![target.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    fn list_associations_for_item(&self, item: NarrativeId) -> StorageResult<Vec<Association>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT source_item_id, target_entity_id, link_type, score \
                 FROM associations WHERE source_item_id = ?1",
            )?;
            let rows = stmt.query_map(params![item.to_string()], |row| {
                let source: String = row.get(0)?;
                let target: String = row.get(1)?;
                Ok(Association {
                    source_item_id: NarrativeId::parse(&source).unwrap_or_default(),
                    target_entity_id: TargetId::parse(&target).unwrap_or_default(),
                    link_type: row.get(2)?,
                    score: row.get::<_, i64>(3)? as u32,
                })
            })?;
            let mut associations = Vec::new();
            for row in rows {
                associations.push(row?);
            }
            Ok(associations)
        })
    }

    fn save_facility(&self, facility: &Facility) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO facilities (id, name, slug, state, operational_status) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    facility.id.to_string(),
                    facility.name,
                    facility.slug,
                    facility.state,
                    facility.operational_status.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    fn find_facility_by_slug(&self, slug: &str) -> StorageResult<Option<Facility>> {
        self.with_conn(|conn| {
            let facility = conn
                .query_row(
                    "SELECT id, name, slug, state, operational_status \
                     FROM facilities WHERE slug = ?1",
                    params![slug],
                    |row| {
                        let id: String = row.get(0)?;
                        let status: String = row.get(4)?;
                        Ok(Facility {
                            id: FacilityId::parse(&id).unwrap_or_default(),
                            name: row.get(1)?,
                            slug: row.get(2)?,
                            state: row.get(3)?,
                            operational_status: OperationalStatus::parse(&status)
                                .unwrap_or(OperationalStatus::Closed),
                        })
                    },
                )
                .optional()?;
            Ok(facility)
        })
    }

    fn insert_partnership(&self, partnership: &Partnership) -> StorageResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO facility_partnerships \
                 (facility_id, partner_kind, partner_id, partnership_type, is_active, description) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    partnership.facility_id.to_string(),
                    partnership.partner.kind(),
                    partnership.partner.id_string(),
                    partnership.partnership_type,
                    partnership.is_active,
                    partnership.description,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn count_partnerships(&self, facility: FacilityId) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM facility_partnerships WHERE facility_id = ?1",
                params![facility.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OrganizationInput, ServiceInput, SourceDescriptor};

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn org(name: &str, slug: &str, website: Option<&str>) -> Organization {
        let input = OrganizationInput {
            name: name.to_string(),
            website: website.map(String::from),
            ..Default::default()
        };
        Organization::from_input(&input, slug.to_string(), &SourceDescriptor::new("test"))
    }

    // === Scenario: duplicate slug rejected as Conflict, not generic error ===
    #[test]
    fn duplicate_org_slug_is_conflict() {
        let store = store();
        store.insert_organization(&org("A", "shared-slug", None)).unwrap();
        let err = store
            .insert_organization(&org("B", "shared-slug", None))
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn duplicate_org_website_is_conflict() {
        let store = store();
        store
            .insert_organization(&org("A", "a", Some("https://example.org")))
            .unwrap();
        let err = store
            .insert_organization(&org("B", "b", Some("https://example.org")))
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn absent_websites_do_not_conflict() {
        let store = store();
        store.insert_organization(&org("A", "a", None)).unwrap();
        store.insert_organization(&org("B", "b", None)).unwrap();
    }

    #[test]
    fn service_slug_unique_within_org_only() {
        let store = store();
        let a = org("A", "a", None);
        let b = org("B", "b", None);
        store.insert_organization(&a).unwrap();
        store.insert_organization(&b).unwrap();

        let input = ServiceInput {
            name: "Outreach".to_string(),
            ..Default::default()
        };
        let src = SourceDescriptor::new("test");
        store
            .insert_service(&Service::from_input(a.id, &input, "outreach".into(), &src))
            .unwrap();
        // Same slug under a different org is fine
        store
            .insert_service(&Service::from_input(b.id, &input, "outreach".into(), &src))
            .unwrap();
        // Same slug under the same org conflicts
        let err = store
            .insert_service(&Service::from_input(a.id, &input, "outreach".into(), &src))
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    // === Scenario: duplicate association insert is a silent no-op ===
    #[test]
    fn duplicate_association_is_noop() {
        let store = store();
        let assoc = Association {
            source_item_id: NarrativeId::new(),
            target_entity_id: TargetId::new(),
            link_type: "mentoring".to_string(),
            score: 65,
        };
        assert!(store.insert_association(&assoc).unwrap());
        assert!(!store.insert_association(&assoc).unwrap());
        assert_eq!(store.count_associations(assoc.target_entity_id).unwrap(), 1);
    }

    #[test]
    fn unlinked_narratives_excludes_linked_items() {
        let store = store();
        let linked = NarrativeItem {
            id: NarrativeId::new(),
            title: "Linked".to_string(),
            body: String::new(),
            themes: vec![],
            origin_organization: None,
            origin_location: None,
        };
        let pending = NarrativeItem {
            id: NarrativeId::new(),
            title: "Pending".to_string(),
            body: String::new(),
            themes: vec![],
            origin_organization: None,
            origin_location: None,
        };
        store.save_narrative_item(&linked).unwrap();
        store.save_narrative_item(&pending).unwrap();
        store
            .insert_association(&Association {
                source_item_id: linked.id,
                target_entity_id: TargetId::new(),
                link_type: "other".to_string(),
                score: 50,
            })
            .unwrap();

        let unlinked = store.list_unlinked_narratives(10).unwrap();
        assert_eq!(unlinked.len(), 1);
        assert_eq!(unlinked[0].title, "Pending");
    }

    #[test]
    fn service_filter_by_source_and_status() {
        let store = store();
        let owner = org("Owner", "owner", None);
        store.insert_organization(&owner).unwrap();

        let input = ServiceInput {
            name: "Court Support".to_string(),
            ..Default::default()
        };
        let from_acnc = Service::from_input(
            owner.id,
            &input,
            "court-support".into(),
            &SourceDescriptor::new("acnc"),
        );
        let input2 = ServiceInput {
            name: "Mentoring".to_string(),
            ..Default::default()
        };
        let mut from_askizzy = Service::from_input(
            owner.id,
            &input2,
            "mentoring".into(),
            &SourceDescriptor::new("askizzy"),
        );
        from_askizzy.verification_status = VerificationStatus::Verified;

        store.insert_service(&from_acnc).unwrap();
        store.insert_service(&from_askizzy).unwrap();

        let filter = ServiceFilter::new().with_source("acnc");
        assert_eq!(store.count_services(&filter).unwrap(), 1);
        assert_eq!(store.list_services(&filter).unwrap()[0].name, "Court Support");

        let filter = ServiceFilter::new().with_status(VerificationStatus::Verified);
        assert_eq!(store.count_services(&filter).unwrap(), 1);
        assert_eq!(store.list_services(&filter).unwrap()[0].name, "Mentoring");
    }

    #[test]
    fn target_ratings_roundtrip() {
        let store = store();
        let entity = TargetEntity::new("Night Patrol", "Community patrol", "Diversion");
        store.save_target_entity(&entity).unwrap();

        store.update_target_ratings(entity.id, 6, 5.4).unwrap();
        let loaded = store.get_target_entity(entity.id).unwrap().unwrap();
        assert_eq!(loaded.narrative_rating, 6);
        assert!((loaded.composite_index - 5.4).abs() < 1e-9);
    }

    #[test]
    fn duplicate_partnership_is_noop() {
        let store = store();
        let facility = Facility::new("Cleveland YDC", "cleveland-ydc");
        store.save_facility(&facility).unwrap();
        let p = Partnership {
            facility_id: facility.id,
            partner: PartnerRef::Organization(OrgId::new()),
            partnership_type: "legal_support".to_string(),
            is_active: true,
            description: None,
        };
        assert!(store.insert_partnership(&p).unwrap());
        assert!(!store.insert_partnership(&p).unwrap());
        assert_eq!(store.count_partnerships(facility.id).unwrap(), 1);
    }
}
