//! External ID mappings for sync tools
//!
//! Maps an external tool's content strings (e.g. a checklist item's text)
//! to issue IDs. The whole map lives in one JSON object per tool under
//! `.grove/sync/`, loaded fully into memory and rewritten atomically.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::IssueId;

/// Storage for one tool's content-to-ID mappings
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    /// Creates a store for the named tool under the sync directory
    pub fn new(sync_dir: &Path, tool: &str) -> Self {
        Self {
            path: sync_dir.join(format!("{}.json", tool)),
        }
    }

    /// Loads the full mapping; a missing file is an empty map
    pub fn read_all(&self) -> Result<BTreeMap<String, IssueId>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read mappings: {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse mappings: {}", self.path.display()))
    }

    /// Rewrites the full mapping.
    ///
    /// Temp file, flush, fsync, then rename over the canonical path, so a
    /// reader never observes a half-written map.
    pub fn write_all(&self, mappings: &BTreeMap<String, IssueId>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create sync dir: {}", parent.display()))?;
        }

        let temp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&temp)
                .with_context(|| format!("Failed to create temp file: {}", temp.display()))?;
            let content = serde_json::to_string_pretty(mappings)?;
            file.write_all(content.as_bytes())?;
            file.write_all(b"\n")?;
            file.flush()?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)
            .with_context(|| format!("Failed to replace mappings: {}", self.path.display()))?;

        Ok(())
    }

    /// Inserts or updates one mapping
    pub fn link(&self, content: &str, id: IssueId) -> Result<()> {
        let mut mappings = self.read_all()?;
        mappings.insert(content.to_string(), id);
        self.write_all(&mappings)
    }

    /// Removes one mapping; returns true if it was present
    pub fn unlink(&self, content: &str) -> Result<bool> {
        let mut mappings = self.read_all()?;
        let removed = mappings.remove(content).is_some();
        if removed {
            self.write_all(&mappings)?;
        }
        Ok(removed)
    }
}
