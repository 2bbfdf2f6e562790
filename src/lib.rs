//! Grove - issue tracking in a directory of markdown files
//!
//! Grove stores issues as markdown files with YAML frontmatter, arranged in
//! a directory tree that encodes both hierarchy (plan > milestone > task)
//! and lifecycle (active, done, backlog, archive). The tree is the
//! database: no index, no daemon, git-friendly by construction.

pub mod cli;
pub mod domain;
pub mod migrate;
pub mod storage;

pub use domain::{Issue, IssueId, Kind, Status};
pub use storage::{IssueStore, Project};
