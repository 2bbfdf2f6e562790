//! Domain models for Grove
//!
//! Contains the core business logic without any I/O concerns.

mod graph;
mod id;
mod issue;

pub use graph::{BlockGraph, GraphError};
pub use id::{slugify, IdError, IssueId, Level, FALLBACK_SLUG, RESERVED_DIRS, SLUG_MAX_LEN};
pub use issue::{
    display_time, now, ts, Issue, IssueFrontmatter, Kind, Status, PRIORITY_DEFAULT, PRIORITY_MAX,
};
