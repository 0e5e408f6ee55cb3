//! Facilities and their typed partnerships
//!
//! A partnership ties a facility to exactly one partner out of three
//! possible tables. The partner reference is a tagged union, so
//! exactly-one-of is a type-system fact rather than a convention over
//! nullable columns.

use super::entity::{OrgId, ServiceId};
use super::narrative::TargetId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(Uuid);

impl FacilityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for FacilityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FacilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a facility currently operates.
///
/// Partnerships are only recorded against operational facilities; a closed
/// facility in an import list is skipped, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalStatus {
    Operational,
    Closed,
}

impl OperationalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "operational" => Some(Self::Operational),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// A physical facility that community partners serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
    pub slug: String,
    pub state: Option<String>,
    pub operational_status: OperationalStatus,
}

impl Facility {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: FacilityId::new(),
            name: name.into(),
            slug: slug.into(),
            state: None,
            operational_status: OperationalStatus::Operational,
        }
    }
}

/// Reference to exactly one partner entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PartnerRef {
    Organization(OrgId),
    Program(TargetId),
    Service(ServiceId),
}

impl PartnerRef {
    /// The discriminant column value used by the storage layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Organization(_) => "organization",
            Self::Program(_) => "program",
            Self::Service(_) => "service",
        }
    }

    /// The referenced ID as a string, for the storage layer's key column.
    pub fn id_string(&self) -> String {
        match self {
            Self::Organization(id) => id.to_string(),
            Self::Program(id) => id.to_string(),
            Self::Service(id) => id.to_string(),
        }
    }
}

/// A typed relationship between a facility and exactly one partner.
///
/// Invariant: at most one partnership per `(facility_id, partner_kind,
/// partner_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partnership {
    pub facility_id: FacilityId,
    pub partner: PartnerRef,
    pub partnership_type: String,
    pub is_active: bool,
    pub description: Option<String>,
}
