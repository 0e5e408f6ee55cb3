//! Identity resolution and safe upsert
//!
//! The resolver answers "is this record a known entity?"; the mediator acts
//! on the answer, creating or merging without ever producing a duplicate.

mod mediator;
mod resolver;

pub use mediator::{Mediator, ResolveError, UpsertOutcome};
pub use resolver::{resolve_organization, resolve_service, OrgKeys, ServiceKeys};
