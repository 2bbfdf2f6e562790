//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project management | `init`, `list`, `show`, `search` |
//! | Hierarchy | Plans and their children | `plan new`, `milestone`, `task` |
//! | Lifecycle | State transitions | `start`, `close`, `plan backlog` |
//! | Dependencies | Blocking edges and queries | `dep`, `undep`, `ready`, `blocked` |
//! | Body | Section appends | `log`, `decision` |
//! | Maintenance | Migration and cleanup | `import`, `purge` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod issue;
mod migrate_cmd;
mod output;
mod plan;
mod query;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
