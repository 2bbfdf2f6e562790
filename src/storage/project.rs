//! Project management
//!
//! Handles project initialization and provides access to the issue store.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{Config, IssueStore};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a grove project. Run 'grove init' first.")]
    NotInProject,
}

/// A Grove project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let grove_dir = root.join(".grove");

        if !grove_dir.is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path.
    ///
    /// Idempotent: existing files are left alone, so re-running `init` in
    /// a project never clobbers configuration or issues.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let grove_dir = root.join(".grove");

        fs::create_dir_all(&grove_dir).with_context(|| {
            format!("Failed to create .grove directory: {}", grove_dir.display())
        })?;

        let issues_dir = grove_dir.join("issues");
        fs::create_dir_all(&issues_dir).with_context(|| {
            format!(
                "Failed to create issues directory: {}",
                issues_dir.display()
            )
        })?;

        let sync_dir = grove_dir.join("sync");
        fs::create_dir_all(&sync_dir)
            .with_context(|| format!("Failed to create sync directory: {}", sync_dir.display()))?;

        let config_path = grove_dir.join("config.toml");
        if !config_path.exists() {
            let default_config = r#"# Grove configuration

# Default priority for new issues (0 critical .. 4 backlog)
default_priority = 2

# Default assignee for new issues
# default_assignee = "alice"
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = grove_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = r#"# Ignore sync state (contains remote IDs)
sync/
"#;
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .grove directory path
    pub fn grove_dir(&self) -> PathBuf {
        self.root.join(".grove")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the issue store over this project's issues root
    pub fn issue_store(&self) -> IssueStore {
        IssueStore::new(self.grove_dir().join("issues"))
    }

    /// Returns the sync state directory
    pub fn sync_dir(&self) -> PathBuf {
        self.grove_dir().join("sync")
    }
}
