//! Configuration handling for Grove
//!
//! Configuration is stored in `.grove/config.toml` (project) and
//! `~/.config/grove/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Default priority for new issues (0 critical .. 4 backlog)
    pub default_priority: u8,

    /// Default assignee for new issues, if any
    pub default_assignee: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            default_priority: crate::domain::PRIORITY_DEFAULT,
            default_assignee: None,
        }
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "grove", "grove-cli").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(".grove").join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")
    }

    /// Finds the project root by looking for a `.grove/` directory,
    /// walking up from the current directory
    pub fn find_project_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(".grove").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}
