//! Storage backends for Conflux
//!
//! Conflux supports multiple storage backends through the `CatalogStore`
//! trait. The primary implementation is `SqliteStore` for persistent
//! storage; `MemoryStore` backs tests and in-process embedding.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CatalogStore, OpenStore, ServiceFilter, StorageError, StorageResult};
