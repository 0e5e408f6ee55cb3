//! Conflux: entity resolution and scored-association engine
//!
//! Ingests descriptive records about organizations, services, narrative
//! content and facilities from uncoordinated external sources, decides
//! whether each record describes a known entity or a new one, and merges
//! without ever producing a duplicate. Separately, it computes weighted
//! associations between narrative items and catalog entities, classifies
//! loosely described relationships through an ordered keyword table, and
//! rolls confirmed association counts back into entity ratings.
//!
//! # Core Concepts
//!
//! - **Resolution cascade**: fixed-order exact-match probes (slug, then
//!   website, then source URL), first hit wins
//! - **Mediator**: create-or-merge with the never-overwrite-with-empty rule
//!   and append-only provenance
//! - **Scorer**: summed fixed weights with a qualification threshold; at
//!   most one association per item per run
//!
//! # Example
//!
//! ```
//! use conflux::{ingest, IngestRequest, MemoryStore, OrganizationInput, ServiceInput, SourceDescriptor};
//!
//! let store = MemoryStore::new();
//! let request = IngestRequest {
//!     source: SourceDescriptor::new("registry"),
//!     organization: OrganizationInput { name: "Sisters Inside".into(), ..Default::default() },
//!     service: ServiceInput { name: "Court Support".into(), ..Default::default() },
//! };
//! let response = ingest(&store, &request).unwrap();
//! assert!(response.organization_created);
//! ```

pub mod catalog;
pub mod classify;
pub mod export;
pub mod ingest;
pub mod normalize;
pub mod resolve;
pub mod scoring;
pub mod storage;

pub use catalog::{
    Association, Facility, FacilityId, NarrativeId, NarrativeItem, OperationalStatus,
    Organization, OrganizationInput, OrgId, Partnership, PartnerRef, ProvenanceEntry, Service,
    ServiceId, ServiceInput, SourceDescriptor, TargetEntity, TargetId, VerificationStatus,
};
pub use classify::{Classification, RuleTable};
pub use export::{export_services, to_csv, ExportPage, ExportRecord};
pub use ingest::{
    ingest, ingest_batch, link::run_link_batch, link::LinkConfig,
    partners::run_partner_import, partners::PartnerKind, partners::PartnerSpec, BatchSummary,
    IngestError, IngestRequest, IngestResponse,
};
pub use normalize::{canonical_url, slugify};
pub use resolve::{Mediator, ResolveError, UpsertOutcome};
pub use scoring::{composite_index, RatingScale, ScorerConfig, TieBreak};
pub use storage::{CatalogStore, MemoryStore, OpenStore, ServiceFilter, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
