//! Migration and sync adapters
//!
//! Bulk import from external trackers (newline-delimited JSON records) and
//! persistent ID mappings for external sync tools.

mod import;
mod mapping;

pub use import::{import_records, ImportDependency, ImportRecord, ImportSummary, RelationKind};
pub use mapping::MappingStore;
