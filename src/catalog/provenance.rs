//! Provenance: the record of which external sources contributed to a
//! canonical entity.
//!
//! Entries are append-only and versioned by timestamp — historical
//! provenance is never silently overwritten. The dedup key is
//! `(system, record_id)`: re-ingesting the same external record leaves the
//! list unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of an external source record, attached to every inbound
/// ingestion request. Never stored standalone; always embedded in an
/// entity's provenance list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Source system name, e.g. a partner domain or registry name
    pub system: String,
    /// External record ID within the source system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Deep link to the source record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Human contact for follow-up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

impl SourceDescriptor {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            record_id: None,
            url: None,
            submitted_by: None,
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_submitted_by(mut self, submitted_by: impl Into<String>) -> Self {
        self.submitted_by = Some(submitted_by.into());
        self
    }

    /// The provenance dedup key.
    pub fn dedup_key(&self) -> (&str, Option<&str>) {
        (&self.system, self.record_id.as_deref())
    }
}

/// One versioned provenance record on a canonical entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub source: SourceDescriptor,
    /// When this source first contributed
    pub recorded_at: DateTime<Utc>,
}

impl ProvenanceEntry {
    pub fn new(source: SourceDescriptor) -> Self {
        Self {
            source,
            recorded_at: Utc::now(),
        }
    }
}

/// Append a source to a provenance list unless an entry with the same
/// `(system, record_id)` already exists. Returns whether the list changed.
pub(crate) fn append_deduped(entries: &mut Vec<ProvenanceEntry>, source: &SourceDescriptor) -> bool {
    let key = source.dedup_key();
    if entries.iter().any(|e| e.source.dedup_key() == key) {
        return false;
    }
    entries.push(ProvenanceEntry::new(source.clone()));
    true
}
