//! # Storage Layer
//!
//! Persistence layer for Grove with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Issues | Markdown + YAML frontmatter | `.grove/issues/**` |
//! | Config | TOML | `.grove/config.toml` |
//! | Sync mappings | JSON | `.grove/sync/{tool}.json` |
//!
//! ## Layout Semantics
//!
//! The directory tree under `.grove/issues/` is the database. An issue's
//! position encodes its parent and lifecycle state; the file name carries
//! its ID. Lifecycle transitions are directory renames, and every document
//! write is atomic (temp file + rename).
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing a Grove project
//! - [`IssueStore`] - Read/write issues over the directory tree
//! - [`Config`] - Project and global configuration

mod config;
pub mod document;
mod project;
mod store;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig};
pub use project::{Project, ProjectError};
pub use store::{
    check_priority, IssueStore, Lifecycle, Located, StoreError, MILESTONE_DOC, PLAN_DOC,
};
