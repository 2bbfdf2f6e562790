//! Hierarchical issue store
//!
//! Maps issues onto a directory tree and back. Canonical layout:
//!
//! ```text
//! issues/
//! ├── p1-user-auth/            # plan (active)
//! │   ├── _plan.md
//! │   ├── artifacts/
//! │   ├── m1-backend-setup/    # milestone
//! │   │   ├── _milestone.md
//! │   │   ├── t1-create-model.md
//! │   │   └── done/            # closed tasks
//! │   └── done/                # closed milestones
//! ├── done/                    # closed plans
//! ├── backlog/                 # parked plans
//! ├── t-7f2b4c1.md             # standalone issue (flat ID)
//! ├── t-9d3e5f2/               # promoted standalone with children
//! │   ├── t-9d3e5f2.md
//! │   └── t-0a1b2c3.md
//! └── archive/                 # closed standalone issues (purgeable)
//! ```
//!
//! An issue lives in exactly one lifecycle location at a time; moves between
//! locations are single renames. All document writes go through a temp file
//! plus rename.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::document::{self, DocumentError};
use crate::domain::{
    BlockGraph, GraphError, Issue, IssueId, Kind, Level, Status, PRIORITY_MAX, RESERVED_DIRS,
};

/// Document file name for a plan directory
pub const PLAN_DOC: &str = "_plan.md";

/// Document file name for a milestone directory
pub const MILESTONE_DOC: &str = "_milestone.md";

const DONE_DIR: &str = "done";
const BACKLOG_DIR: &str = "backlog";
const ARCHIVE_DIR: &str = "archive";
const ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Issue not found: {0}")]
    NotFound(String),

    #[error("Ambiguous ID '{prefix}': matches {}", .candidates.join(", "))]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("Adding dependency would create a cycle: {blockee} -> {blocker}")]
    DependencyCycle { blockee: IssueId, blocker: IssueId },

    #[error("Dependency target not found: {0}")]
    DependencyNotFound(String),

    #[error("Cannot close {id}: {open} child issue(s) still open")]
    ChildrenNotClosed { id: IssueId, open: usize },

    #[error("Issue already exists: {0}")]
    AlreadyExists(IssueId),

    #[error("{id} is not a {expected}")]
    WrongKind { id: IssueId, expected: Kind },

    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Priority must be 0..={PRIORITY_MAX}, got {0}")]
    InvalidPriority(u8),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which lifecycle location holds an issue's backing storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Done,
    Backlog,
    Archive,
}

/// An issue together with where it was found
#[derive(Debug, Clone)]
pub struct Located {
    pub issue: Issue,
    /// Path to the issue's document file
    pub path: PathBuf,
    pub lifecycle: Lifecycle,
}

impl Located {
    /// The filesystem entity that moves on relocation: the containing
    /// directory for plans, milestones, and promoted standalone issues,
    /// the document file itself otherwise.
    fn entity_path(&self) -> PathBuf {
        let file_name = self.path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        let is_dir_doc = file_name == PLAN_DOC
            || file_name == MILESTONE_DOC
            || self
                .path
                .parent()
                .and_then(|d| d.file_name())
                .and_then(|n| n.to_str())
                .map(|d| format!("{}.md", d) == file_name)
                .unwrap_or(false);

        if is_dir_doc {
            self.path.parent().unwrap_or(&self.path).to_path_buf()
        } else {
            self.path.clone()
        }
    }
}

/// Store over a directory tree of issue documents
pub struct IssueStore {
    /// The `issues/` root
    root: PathBuf,
}

impl IssueStore {
    /// Creates a store over the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the issues root
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ------------------------------------------------------------------
    // Scanning and lookup
    // ------------------------------------------------------------------

    /// Enumerates every issue across all lifecycle locations, active tree
    /// first, then `done/`, `backlog/`, and `archive/`.
    pub fn scan(&self) -> Result<Vec<Located>, StoreError> {
        let mut out = Vec::new();
        if !self.root.is_dir() {
            return Ok(out);
        }

        for entry in sorted_entries(&self.root)? {
            let name = entry_name(&entry);
            if entry.is_dir() && RESERVED_DIRS.contains(&name.as_str()) {
                continue;
            }
            self.scan_root_entry(&entry, &name, Lifecycle::Active, &mut out)?;
        }

        let done = self.root.join(DONE_DIR);
        if done.is_dir() {
            for dir in sorted_entries(&done)? {
                if dir.is_dir() {
                    self.scan_plan_dir(&dir, Lifecycle::Done, &mut out)?;
                }
            }
        }

        let backlog = self.root.join(BACKLOG_DIR);
        if backlog.is_dir() {
            for dir in sorted_entries(&backlog)? {
                if dir.is_dir() {
                    self.scan_plan_dir(&dir, Lifecycle::Backlog, &mut out)?;
                }
            }
        }

        let archive = self.root.join(ARCHIVE_DIR);
        if archive.is_dir() {
            self.scan_standalone_dir(&archive, None, Lifecycle::Archive, &mut out)?;
        }

        Ok(out)
    }

    fn scan_root_entry(
        &self,
        path: &Path,
        name: &str,
        lifecycle: Lifecycle,
        out: &mut Vec<Located>,
    ) -> Result<(), StoreError> {
        if path.is_file() {
            if let Some(id) = md_stem_id(name) {
                out.push(self.read_located(path, id, None, lifecycle)?);
            }
        } else if path.is_dir() {
            if path.join(PLAN_DOC).is_file() {
                self.scan_plan_dir(path, lifecycle, out)?;
            } else if let Ok(id @ IssueId::Flat { .. }) = name.parse::<IssueId>() {
                let self_doc = path.join(format!("{}.md", name));
                if self_doc.is_file() {
                    out.push(self.read_located(&self_doc, id.clone(), None, lifecycle)?);
                }
                self.scan_standalone_dir(path, Some(&id), lifecycle, out)?;
            }
        }
        Ok(())
    }

    fn scan_plan_dir(
        &self,
        dir: &Path,
        lifecycle: Lifecycle,
        out: &mut Vec<Located>,
    ) -> Result<(), StoreError> {
        let Some(plan_id) = dir_id(dir, Level::Plan) else {
            return Ok(());
        };

        let doc = dir.join(PLAN_DOC);
        if !doc.is_file() {
            return Ok(());
        }
        out.push(self.read_located(&doc, plan_id.clone(), None, lifecycle)?);

        for entry in sorted_entries(dir)? {
            if !entry.is_dir() {
                continue;
            }
            let name = entry_name(&entry);

            if name == DONE_DIR {
                for closed in sorted_entries(&entry)? {
                    if closed.is_dir() {
                        self.scan_milestone_dir(&closed, &plan_id, Lifecycle::Done, out)?;
                    }
                }
            } else if name != ARTIFACTS_DIR {
                self.scan_milestone_dir(&entry, &plan_id, lifecycle, out)?;
            }
        }
        Ok(())
    }

    fn scan_milestone_dir(
        &self,
        dir: &Path,
        plan_id: &IssueId,
        lifecycle: Lifecycle,
        out: &mut Vec<Located>,
    ) -> Result<(), StoreError> {
        let Some(milestone_id) = dir_id(dir, Level::Milestone) else {
            return Ok(());
        };

        let doc = dir.join(MILESTONE_DOC);
        if !doc.is_file() {
            return Ok(());
        }
        out.push(self.read_located(&doc, milestone_id.clone(), Some(plan_id.clone()), lifecycle)?);

        for entry in sorted_entries(dir)? {
            let name = entry_name(&entry);

            if entry.is_file() && name != MILESTONE_DOC {
                if let Some(id) = md_stem_id(&name) {
                    out.push(self.read_located(
                        &entry,
                        id,
                        Some(milestone_id.clone()),
                        lifecycle,
                    )?);
                }
            } else if entry.is_dir() && name == DONE_DIR {
                for closed in sorted_entries(&entry)? {
                    let closed_name = entry_name(&closed);
                    if closed.is_file() {
                        if let Some(id) = md_stem_id(&closed_name) {
                            out.push(self.read_located(
                                &closed,
                                id,
                                Some(milestone_id.clone()),
                                Lifecycle::Done,
                            )?);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Scans a directory of standalone (flat-ID) issues: loose `.md` files
    /// plus promoted subdirectories. `parent` is the owning issue, if any.
    fn scan_standalone_dir(
        &self,
        dir: &Path,
        parent: Option<&IssueId>,
        lifecycle: Lifecycle,
        out: &mut Vec<Located>,
    ) -> Result<(), StoreError> {
        for entry in sorted_entries(dir)? {
            let name = entry_name(&entry);

            if entry.is_file() {
                let Some(id) = md_stem_id(&name) else {
                    continue;
                };
                // the promoted directory's own document was read by the caller
                if Some(&id) == parent {
                    continue;
                }
                out.push(self.read_located(&entry, id, parent.cloned(), lifecycle)?);
            } else if entry.is_dir() {
                let Ok(dir_issue @ IssueId::Flat { .. }) = name.parse::<IssueId>() else {
                    continue;
                };
                let self_doc = entry.join(format!("{}.md", name));
                if self_doc.is_file() {
                    out.push(self.read_located(
                        &self_doc,
                        dir_issue.clone(),
                        parent.cloned(),
                        lifecycle,
                    )?);
                }
                // a directory without its own document still scopes its
                // children (archived child under a still-active parent)
                self.scan_standalone_dir(&entry, Some(&dir_issue), lifecycle, out)?;
            }
        }
        Ok(())
    }

    fn read_located(
        &self,
        path: &Path,
        id: IssueId,
        parent: Option<IssueId>,
        lifecycle: Lifecycle,
    ) -> Result<Located, StoreError> {
        let content = fs::read_to_string(path)?;
        let (fm, body) = document::parse(&content)?;
        Ok(Located {
            issue: fm.into_issue(id, parent, body),
            path: path.to_path_buf(),
            lifecycle,
        })
    }

    /// Finds an issue by exact ID, searching every lifecycle location
    pub fn find(&self, id: &IssueId) -> Result<Located, StoreError> {
        self.scan()?
            .into_iter()
            .find(|l| &l.issue.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Reads an issue by exact ID
    pub fn get(&self, id: &IssueId) -> Result<Issue, StoreError> {
        Ok(self.find(id)?.issue)
    }

    /// Returns true if an issue with this ID exists anywhere
    pub fn exists(&self, id: &IssueId) -> Result<bool, StoreError> {
        Ok(self.scan()?.iter().any(|l| &l.issue.id == id))
    }

    /// Resolves a user-typed prefix to a full ID.
    ///
    /// An exact match wins immediately, even when it is also a prefix of
    /// other IDs. Otherwise the prefix must select exactly one candidate.
    pub fn resolve(&self, prefix: &str) -> Result<IssueId, StoreError> {
        let ids: Vec<IssueId> = self.scan()?.into_iter().map(|l| l.issue.id).collect();

        if let Some(exact) = ids.iter().find(|id| id.to_string() == prefix) {
            return Ok(exact.clone());
        }

        let mut candidates: Vec<&IssueId> = ids
            .iter()
            .filter(|id| id.to_string().starts_with(prefix))
            .collect();
        candidates.sort_by_key(|id| id.to_string());
        candidates.dedup();

        match candidates.len() {
            0 => Err(StoreError::NotFound(prefix.to_string())),
            1 => Ok(candidates[0].clone()),
            _ => Err(StoreError::Ambiguous {
                prefix: prefix.to_string(),
                candidates: candidates.iter().map(|id| id.to_string()).collect(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocates a flat ID unique across the full known-ID set
    fn allocate_flat(&self, title: &str) -> Result<IssueId, StoreError> {
        let known: Vec<IssueId> = self.scan()?.into_iter().map(|l| l.issue.id).collect();
        let ts = crate::domain::now();

        let mut attempt = 0;
        loop {
            let id = IssueId::new_flat(title, ts, attempt);
            if !known.contains(&id) {
                return Ok(id);
            }
            attempt += 1;
        }
    }

    /// Allocates the next scoped ID for `level` within `scope_dir`.
    ///
    /// The counter comes from the direct scope-directory listing (skipping
    /// reserved names), but the candidate must then clear the full known-ID
    /// set: a milestone closed into `done/` or a plan parked in `backlog/`
    /// still owns its ID, so a recreated title bumps past it.
    fn allocate_scoped(
        &self,
        scope_dir: &Path,
        level: Level,
        title: &str,
    ) -> Result<IssueId, StoreError> {
        let known: Vec<IssueId> = self.scan()?.into_iter().map(|l| l.issue.id).collect();
        let mut max_seq = 0;

        if scope_dir.is_dir() {
            for entry in fs::read_dir(scope_dir)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') || RESERVED_DIRS.contains(&name.as_str()) {
                    continue;
                }

                let stem = name.strip_suffix(".md").unwrap_or(&name);
                if let Ok(IssueId::Scoped { level: l, seq, .. }) = stem.parse::<IssueId>() {
                    if l == level {
                        max_seq = max_seq.max(seq);
                    }
                }
            }
        }

        let mut id = IssueId::new_scoped(level, max_seq + 1, title);
        while known.contains(&id)
            || scope_dir.join(id.to_string()).exists()
            || scope_dir.join(format!("{}.md", id)).exists()
        {
            match id.bump_seq() {
                Some(next) => id = next,
                None => break, // scoped ids always bump
            }
        }
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Creates a plan: `{root}/{plan}/_plan.md` plus its `artifacts/` dir
    pub fn create_plan(
        &self,
        title: &str,
        scope: Option<String>,
        acceptance: Option<String>,
    ) -> Result<Issue, StoreError> {
        require_title(title)?;

        let id = self.allocate_scoped(&self.root, Level::Plan, title)?;
        let mut plan = Issue::new(id.clone(), Kind::Plan, title);
        plan.scope = scope;
        plan.acceptance = acceptance;
        plan.seed_body();

        let dir = self.root.join(id.to_string());
        fs::create_dir_all(dir.join(ARTIFACTS_DIR))?;
        self.write_doc(&dir.join(PLAN_DOC), &plan)?;

        Ok(plan)
    }

    /// Creates a milestone under a plan
    pub fn create_milestone(&self, plan: &IssueId, title: &str) -> Result<Issue, StoreError> {
        require_title(title)?;

        let located = self.find(plan)?;
        if located.issue.kind != Kind::Plan {
            return Err(StoreError::WrongKind {
                id: plan.clone(),
                expected: Kind::Plan,
            });
        }

        let plan_dir = located.entity_path();
        let id = self.allocate_scoped(&plan_dir, Level::Milestone, title)?;

        let mut milestone = Issue::new(id.clone(), Kind::Milestone, title);
        milestone.parent = Some(plan.clone());
        milestone.seed_body();

        let dir = plan_dir.join(id.to_string());
        fs::create_dir_all(&dir)?;
        self.write_doc(&dir.join(MILESTONE_DOC), &milestone)?;

        Ok(milestone)
    }

    /// Creates a task under a milestone
    pub fn create_task(&self, milestone: &IssueId, title: &str) -> Result<Issue, StoreError> {
        require_title(title)?;

        let located = self.find(milestone)?;
        if located.issue.kind != Kind::Milestone {
            return Err(StoreError::WrongKind {
                id: milestone.clone(),
                expected: Kind::Milestone,
            });
        }

        let milestone_dir = located.entity_path();
        let id = self.allocate_scoped(&milestone_dir, Level::Task, title)?;

        let mut task = Issue::new(id.clone(), Kind::Task, title);
        task.parent = Some(milestone.clone());
        task.seed_body();

        self.write_doc(&milestone_dir.join(format!("{}.md", id)), &task)?;
        Ok(task)
    }

    /// Creates a generic standalone issue, optionally parented under another
    /// standalone issue (promoting a leaf parent to a directory first).
    pub fn create_issue(
        &self,
        title: &str,
        parent: Option<&IssueId>,
    ) -> Result<Issue, StoreError> {
        require_title(title)?;

        let id = self.allocate_flat(title)?;
        let mut issue = Issue::new(id.clone(), Kind::Task, title);

        let dir = match parent {
            None => self.root.clone(),
            Some(parent_id) => {
                let located = self.find(parent_id)?;
                if !located.issue.id.is_flat() {
                    return Err(StoreError::WrongKind {
                        id: parent_id.clone(),
                        expected: Kind::Task,
                    });
                }
                issue.parent = Some(parent_id.clone());
                self.promote_if_leaf(&located)?
            }
        };

        fs::create_dir_all(&dir)?;
        self.write_doc(&dir.join(format!("{}.md", id)), &issue)?;
        Ok(issue)
    }

    /// Creates an issue at a caller-supplied ID (bulk import). Fails with
    /// `AlreadyExists` before writing anything if the ID is taken.
    pub fn create_with_id(
        &self,
        issue: &Issue,
        parent: Option<&IssueId>,
    ) -> Result<(), StoreError> {
        require_title(&issue.title)?;
        if self.exists(&issue.id)? {
            return Err(StoreError::AlreadyExists(issue.id.clone()));
        }

        let dir = match parent {
            None => self.root.clone(),
            Some(parent_id) => {
                let located = self.find(parent_id)?;
                self.promote_if_leaf(&located)?
            }
        };

        fs::create_dir_all(&dir)?;
        self.write_doc(&dir.join(format!("{}.md", issue.id)), issue)?;
        Ok(())
    }

    /// Promotes a leaf standalone issue file into a same-named directory so
    /// it can hold children. Returns the directory that holds the children.
    ///
    /// Two phases: copy the document into the new directory (via the usual
    /// temp file + rename), then remove the original. A crash in between
    /// leaves both copies readable; the active-tree scan prefers neither
    /// because the directory layout, once present, is canonical.
    fn promote_if_leaf(&self, located: &Located) -> Result<PathBuf, StoreError> {
        let entity = located.entity_path();
        if entity.is_dir() {
            return Ok(entity); // already promoted
        }

        let file_name = entity
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::NotFound(located.issue.id.to_string()))?;
        let dir = entity.with_extension("");

        fs::create_dir_all(&dir)?;
        self.write_doc(&dir.join(file_name), &located.issue)?;
        fs::remove_file(&entity)?;

        Ok(dir)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Writes an issue back to wherever it currently lives
    pub fn update(&self, issue: &Issue) -> Result<(), StoreError> {
        let located = self.find(&issue.id)?;
        self.write_doc(&located.path, issue)
    }

    /// Appends an entry to a named section of an issue's body.
    ///
    /// Only the body region is rewritten; header bytes pass through
    /// untouched, including any hand-edited formatting.
    pub fn append_section(
        &self,
        id: &IssueId,
        heading: &str,
        entry: &str,
    ) -> Result<(), StoreError> {
        let located = self.find(id)?;
        let raw = fs::read_to_string(&located.path)?;
        let off = document::body_offset(&raw)?;

        let mut content = raw[..off].to_string();
        content.push_str(&document::append_to_section(&raw[off..], heading, entry));

        self.write_raw(&located.path, &content)
    }

    /// Closes an issue and relocates it (and any now-fully-closed subtree)
    /// to its done/archive location.
    ///
    /// Fails with `ChildrenNotClosed` before touching anything if a direct
    /// child is still open or active. Closing an already-relocated issue is
    /// a no-op.
    pub fn close(&self, id: &IssueId, reason: Option<String>) -> Result<Located, StoreError> {
        let located = self.find(id)?;

        if located.issue.status.is_closed()
            && matches!(located.lifecycle, Lifecycle::Done | Lifecycle::Archive)
        {
            return Ok(located);
        }

        let open_children = self
            .scan()?
            .iter()
            .filter(|l| l.issue.parent.as_ref() == Some(id) && !l.issue.status.is_closed())
            .count();
        if open_children > 0 {
            return Err(StoreError::ChildrenNotClosed {
                id: id.clone(),
                open: open_children,
            });
        }

        let mut issue = located.issue.clone();
        issue.close(reason);
        self.write_doc(&located.path, &issue)?;

        let target = self.relocate_closed(&located)?;
        Ok(Located {
            issue,
            path: target,
            lifecycle: relocated_lifecycle(&located.issue.id),
        })
    }

    /// Moves a freshly closed issue's entity to its done/archive location,
    /// returning the new document path.
    fn relocate_closed(&self, located: &Located) -> Result<PathBuf, StoreError> {
        let entity = located.entity_path();

        let (target_entity, doc_name) = match located.issue.id.level() {
            Some(Level::Plan) => {
                let target = self.root.join(DONE_DIR).join(entity_name(&entity));
                (target, Some(PLAN_DOC))
            }
            Some(Level::Milestone) => {
                let plan_dir = entity.parent().unwrap_or(&self.root).to_path_buf();
                let target = plan_dir.join(DONE_DIR).join(entity_name(&entity));
                (target, Some(MILESTONE_DOC))
            }
            Some(Level::Task) => {
                let milestone_dir = entity.parent().unwrap_or(&self.root).to_path_buf();
                let target = milestone_dir.join(DONE_DIR).join(entity_name(&entity));
                (target, None)
            }
            None => {
                // standalone: archive mirrors the path relative to the root,
                // so a parented child keeps its subtree position
                let rel = entity
                    .strip_prefix(&self.root)
                    .unwrap_or(&entity)
                    .to_path_buf();
                (self.root.join(ARCHIVE_DIR).join(rel), None)
            }
        };

        if let Some(parent) = target_entity.parent() {
            fs::create_dir_all(parent)?;
        }
        move_entity(&entity, &target_entity)?;

        let doc_path = match doc_name {
            Some(name) => target_entity.join(name),
            None if target_entity.is_dir() => {
                target_entity.join(format!("{}.md", entity_name(&target_entity)))
            }
            None => target_entity,
        };
        Ok(doc_path)
    }

    /// Sets an issue active, in place; no relocation
    pub fn activate(&self, id: &IssueId) -> Result<Issue, StoreError> {
        let located = self.find(id)?;
        let mut issue = located.issue;
        issue.activate();
        self.write_doc(&located.path, &issue)?;
        Ok(issue)
    }

    /// Removes an issue and, if it owns children, its entire subtree,
    /// regardless of child status. Intentionally weaker than close's guard.
    pub fn delete(&self, id: &IssueId) -> Result<(), StoreError> {
        let located = self.find(id)?;
        let entity = located.entity_path();

        if entity.is_dir() {
            fs::remove_dir_all(&entity)?;
        } else {
            fs::remove_file(&entity)?;
        }
        Ok(())
    }

    /// Parks a plan: whole-subtree move to `backlog/`
    pub fn backlog(&self, plan: &IssueId) -> Result<(), StoreError> {
        let located = self.find(plan)?;
        require_plan(&located)?;
        if located.lifecycle == Lifecycle::Backlog {
            return Ok(());
        }

        let entity = located.entity_path();
        let target = self.root.join(BACKLOG_DIR).join(entity_name(&entity));
        fs::create_dir_all(self.root.join(BACKLOG_DIR))?;
        fs::rename(&entity, &target)?;
        Ok(())
    }

    /// Restores a backlogged plan to the active root
    pub fn unbacklog(&self, plan: &IssueId) -> Result<(), StoreError> {
        let located = self.find(plan)?;
        require_plan(&located)?;
        if located.lifecycle != Lifecycle::Backlog {
            return Ok(());
        }

        let entity = located.entity_path();
        let target = self.root.join(entity_name(&entity));
        fs::rename(&entity, &target)?;
        Ok(())
    }

    /// Permanently removes the archive location and everything in it
    pub fn purge_archive(&self) -> Result<usize, StoreError> {
        let archive = self.root.join(ARCHIVE_DIR);
        if !archive.is_dir() {
            return Ok(0);
        }

        let mut archived = Vec::new();
        self.scan_standalone_dir(&archive, None, Lifecycle::Archive, &mut archived)?;
        fs::remove_dir_all(&archive)?;
        Ok(archived.len())
    }

    // ------------------------------------------------------------------
    // Blocking edges and queries
    // ------------------------------------------------------------------

    /// Records that `blockee` waits on `blocker`.
    ///
    /// Both IDs must exist, and the reachability check runs before any
    /// write: a rejected edge leaves both issues byte-identical.
    pub fn add_block(&self, blockee: &IssueId, blocker: &IssueId) -> Result<(), StoreError> {
        let all = self.scan()?;

        for id in [blockee, blocker] {
            if !all.iter().any(|l| &l.issue.id == id) {
                return Err(StoreError::DependencyNotFound(id.to_string()));
            }
        }

        let mut graph = BlockGraph::from_issues(all.iter().map(|l| &l.issue));
        graph.add_edge(blockee, blocker).map_err(|e| match e {
            GraphError::CycleDetected(_, _) | GraphError::SelfDependency(_) => {
                StoreError::DependencyCycle {
                    blockee: blockee.clone(),
                    blocker: blocker.clone(),
                }
            }
            GraphError::IssueNotFound(id) => StoreError::DependencyNotFound(id.to_string()),
        })?;

        let located = all
            .into_iter()
            .find(|l| &l.issue.id == blockee)
            .ok_or_else(|| StoreError::NotFound(blockee.to_string()))?;

        let mut issue = located.issue;
        if issue.add_blocker(blocker.clone()) {
            self.write_doc(&located.path, &issue)?;
        }
        Ok(())
    }

    /// Removes a blocking edge; missing edges are not an error
    pub fn remove_block(&self, blockee: &IssueId, blocker: &IssueId) -> Result<(), StoreError> {
        let located = self.find(blockee)?;
        let mut issue = located.issue;
        if issue.remove_blocker(blocker) {
            self.write_doc(&located.path, &issue)?;
        }
        Ok(())
    }

    /// Issues that are open with every blocker closed
    pub fn ready(&self) -> Result<Vec<Issue>, StoreError> {
        let all = self.scan()?;
        let statuses = status_index(&all);

        Ok(all
            .into_iter()
            .map(|l| l.issue)
            .filter(|i| i.is_ready(&statuses))
            .collect())
    }

    /// Unclosed issues with at least one open or active direct blocker
    pub fn blocked(&self) -> Result<Vec<Issue>, StoreError> {
        let all = self.scan()?;
        let statuses = status_index(&all);

        Ok(all
            .into_iter()
            .map(|l| l.issue)
            .filter(|i| !i.status.is_closed() && i.is_blocked_display(&statuses))
            .collect())
    }

    /// Case-insensitive title substring search over every location
    pub fn search(&self, query: &str) -> Result<Vec<Located>, StoreError> {
        let needle = query.to_lowercase();
        Ok(self
            .scan()?
            .into_iter()
            .filter(|l| l.issue.title.to_lowercase().contains(&needle))
            .collect())
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    fn write_doc(&self, path: &Path, issue: &Issue) -> Result<(), StoreError> {
        let content = document::render(issue)?;
        self.write_raw(path, &content)
    }

    /// Atomic write: temp file in the same directory, then rename
    fn write_raw(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = path.with_extension("md.tmp");
        fs::write(&temp, content)?;
        fs::rename(&temp, path)?;
        Ok(())
    }
}

/// Renames `src` to `dst`, merging into `dst` when both are directories.
/// The archive can already hold part of a subtree when a child was
/// archived while its parent was still active.
fn move_entity(src: &Path, dst: &Path) -> std::io::Result<()> {
    if src.is_dir() && dst.is_dir() {
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            move_entity(&entry.path(), &dst.join(entry.file_name()))?;
        }
        fs::remove_dir(src)
    } else {
        fs::rename(src, dst)
    }
}

fn require_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        Err(StoreError::EmptyTitle)
    } else {
        Ok(())
    }
}

fn require_plan(located: &Located) -> Result<(), StoreError> {
    if located.issue.kind != Kind::Plan {
        return Err(StoreError::WrongKind {
            id: located.issue.id.clone(),
            expected: Kind::Plan,
        });
    }
    Ok(())
}

/// Validates a priority value at the boundary
pub fn check_priority(priority: u8) -> Result<u8, StoreError> {
    if priority > PRIORITY_MAX {
        Err(StoreError::InvalidPriority(priority))
    } else {
        Ok(priority)
    }
}

/// Status of every known issue, for readiness queries
fn status_index(located: &[Located]) -> HashMap<IssueId, Status> {
    located
        .iter()
        .map(|l| (l.issue.id.clone(), l.issue.status))
        .collect()
}

fn relocated_lifecycle(id: &IssueId) -> Lifecycle {
    if id.is_scoped() {
        Lifecycle::Done
    } else {
        Lifecycle::Archive
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn entity_name(path: &Path) -> String {
    entry_name(path)
}

/// Parses `{id}.md` file names, ignoring everything else
fn md_stem_id(name: &str) -> Option<IssueId> {
    let stem = name.strip_suffix(".md")?;
    stem.parse().ok()
}

/// Parses a directory name as a scoped ID at the expected level
fn dir_id(dir: &Path, level: Level) -> Option<IssueId> {
    let id: IssueId = entry_name(dir).parse().ok()?;
    (id.level() == Some(level)).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, IssueStore) {
        let dir = TempDir::new().unwrap();
        let store = IssueStore::new(dir.path().join("issues"));
        fs::create_dir_all(store.root()).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_store_scans_empty() {
        let (_dir, store) = store();
        assert!(store.scan().unwrap().is_empty());
    }

    #[test]
    fn plan_layout() {
        let (_dir, store) = store();
        let plan = store.create_plan("User Auth", None, None).unwrap();

        assert_eq!(plan.id.to_string(), "p1-user-auth");
        assert!(store.root().join("p1-user-auth/_plan.md").is_file());
        assert!(store.root().join("p1-user-auth/artifacts").is_dir());
    }

    #[test]
    fn three_level_hierarchy() {
        let (_dir, store) = store();
        let plan = store.create_plan("User Auth", None, None).unwrap();
        let milestone = store.create_milestone(&plan.id, "Backend Setup").unwrap();
        let task = store.create_task(&milestone.id, "Create Model").unwrap();

        assert_eq!(milestone.id.to_string(), "m1-backend-setup");
        assert_eq!(task.id.to_string(), "t1-create-model");
        assert!(store
            .root()
            .join("p1-user-auth/m1-backend-setup/t1-create-model.md")
            .is_file());

        let all = store.scan().unwrap();
        assert_eq!(all.len(), 3);

        let found_task = store.find(&task.id).unwrap();
        assert_eq!(found_task.issue.parent, Some(milestone.id.clone()));
        let found_milestone = store.find(&milestone.id).unwrap();
        assert_eq!(found_milestone.issue.parent, Some(plan.id));
    }

    #[test]
    fn scoped_counters_are_scope_local() {
        let (_dir, store) = store();
        let plan_a = store.create_plan("Alpha", None, None).unwrap();
        let plan_b = store.create_plan("Beta", None, None).unwrap();

        let m_a = store.create_milestone(&plan_a.id, "Setup A").unwrap();
        let m_b = store.create_milestone(&plan_b.id, "Setup B").unwrap();

        // each plan gets its own m1
        assert_eq!(m_a.id.seq(), Some(1));
        assert_eq!(m_b.id.seq(), Some(1));
        assert_eq!(plan_b.id.seq(), Some(2)); // plan counter is store-global
    }

    #[test]
    fn slug_collision_bumps_counter() {
        let (_dir, store) = store();
        store.create_plan("Auth", None, None).unwrap();
        // force a sibling with the colliding next name
        fs::create_dir_all(store.root().join("p2-auth")).unwrap();

        let plan = store.create_plan("Auth", None, None).unwrap();
        assert_eq!(plan.id.to_string(), "p3-auth");
    }

    #[test]
    fn empty_title_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.create_plan("  ", None, None),
            Err(StoreError::EmptyTitle)
        ));
        assert!(matches!(
            store.create_issue("", None),
            Err(StoreError::EmptyTitle)
        ));
    }

    #[test]
    fn punctuation_title_still_allocates() {
        let (_dir, store) = store();
        let plan = store.create_plan("???", None, None).unwrap();
        assert_eq!(plan.id.to_string(), "p1-untitled");
    }

    #[test]
    fn standalone_roundtrip() {
        let (_dir, store) = store();
        let issue = store.create_issue("Fix typo", None).unwrap();

        let loaded = store.get(&issue.id).unwrap();
        assert_eq!(loaded, issue);
    }

    #[test]
    fn promotion_on_second_child() {
        let (_dir, store) = store();
        let parent = store.create_issue("Parent work", None).unwrap();
        let parent_file = store.root().join(format!("{}.md", parent.id));
        assert!(parent_file.is_file());

        let child = store.create_issue("Child work", Some(&parent.id)).unwrap();

        // parent file moved into a same-named directory
        assert!(!parent_file.exists());
        let parent_dir = store.root().join(parent.id.to_string());
        assert!(parent_dir.join(format!("{}.md", parent.id)).is_file());
        assert!(parent_dir.join(format!("{}.md", child.id)).is_file());

        // parent still readable, child knows its parent
        assert_eq!(store.get(&parent.id).unwrap().title, "Parent work");
        assert_eq!(store.get(&child.id).unwrap().parent, Some(parent.id));
    }

    #[test]
    fn close_task_moves_to_done() {
        let (_dir, store) = store();
        let plan = store.create_plan("User Auth", None, None).unwrap();
        let milestone = store.create_milestone(&plan.id, "Backend").unwrap();
        let t1 = store.create_task(&milestone.id, "First").unwrap();
        let t2 = store.create_task(&milestone.id, "Second").unwrap();

        let closed = store.close(&t1.id, Some("shipped".into())).unwrap();

        assert_eq!(closed.issue.status, Status::Closed);
        assert!(closed.issue.closed_at.is_some());
        assert!(store
            .root()
            .join("p1-user-auth/m1-backend/done/t1-first.md")
            .is_file());
        assert!(!store
            .root()
            .join("p1-user-auth/m1-backend/t1-first.md")
            .exists());

        // sibling and milestone untouched
        assert_eq!(store.get(&t2.id).unwrap().status, Status::Open);
        assert_eq!(store.get(&milestone.id).unwrap().status, Status::Open);
    }

    #[test]
    fn close_with_open_children_fails_cleanly() {
        let (_dir, store) = store();
        let plan = store.create_plan("User Auth", None, None).unwrap();
        let milestone = store.create_milestone(&plan.id, "Backend").unwrap();
        store.create_task(&milestone.id, "First").unwrap();

        let before = fs::read_to_string(
            store.root().join("p1-user-auth/m1-backend/_milestone.md"),
        )
        .unwrap();

        let result = store.close(&milestone.id, None);
        assert!(matches!(
            result,
            Err(StoreError::ChildrenNotClosed { open: 1, .. })
        ));

        // nothing on disk changed
        let after = fs::read_to_string(
            store.root().join("p1-user-auth/m1-backend/_milestone.md"),
        )
        .unwrap();
        assert_eq!(before, after);
        assert!(store
            .root()
            .join("p1-user-auth/m1-backend/t1-first.md")
            .is_file());
    }

    #[test]
    fn close_milestone_relocates_subtree() {
        let (_dir, store) = store();
        let plan = store.create_plan("User Auth", None, None).unwrap();
        let milestone = store.create_milestone(&plan.id, "Backend").unwrap();
        let t1 = store.create_task(&milestone.id, "First").unwrap();
        let t2 = store.create_task(&milestone.id, "Second").unwrap();

        store.close(&t1.id, None).unwrap();
        store.close(&t2.id, None).unwrap();
        store.close(&milestone.id, None).unwrap();

        let done_dir = store.root().join("p1-user-auth/done/m1-backend");
        assert!(done_dir.join("_milestone.md").is_file());
        assert!(done_dir.join("done/t1-first.md").is_file());
        assert!(done_dir.join("done/t2-second.md").is_file());
        assert!(!store.root().join("p1-user-auth/m1-backend").exists());

        // still findable after relocation
        assert_eq!(store.get(&milestone.id).unwrap().status, Status::Closed);
        assert_eq!(store.get(&t1.id).unwrap().status, Status::Closed);
    }

    #[test]
    fn close_plan_relocates_to_root_done() {
        let (_dir, store) = store();
        let plan = store.create_plan("User Auth", None, None).unwrap();
        let milestone = store.create_milestone(&plan.id, "Backend").unwrap();
        store.close(&milestone.id, None).unwrap();
        store.close(&plan.id, None).unwrap();

        assert!(store
            .root()
            .join("done/p1-user-auth/_plan.md")
            .is_file());
        assert!(!store.root().join("p1-user-auth").exists());
        assert_eq!(store.get(&plan.id).unwrap().status, Status::Closed);
    }

    #[test]
    fn close_standalone_archives() {
        let (_dir, store) = store();
        let issue = store.create_issue("Fix typo", None).unwrap();

        store.close(&issue.id, None).unwrap();

        assert!(store
            .root()
            .join(ARCHIVE_DIR)
            .join(format!("{}.md", issue.id))
            .is_file());
        assert!(!store.root().join(format!("{}.md", issue.id)).exists());
    }

    #[test]
    fn close_parented_standalone_preserves_subtree_position() {
        let (_dir, store) = store();
        let parent = store.create_issue("Parent", None).unwrap();
        let child = store.create_issue("Child", Some(&parent.id)).unwrap();

        store.close(&child.id, None).unwrap();

        let archived = store
            .root()
            .join(ARCHIVE_DIR)
            .join(parent.id.to_string())
            .join(format!("{}.md", child.id));
        assert!(archived.is_file());

        // archived child still resolves with its parent attached
        let found = store.find(&child.id).unwrap();
        assert_eq!(found.lifecycle, Lifecycle::Archive);
        assert_eq!(found.issue.parent, Some(parent.id));
    }

    #[test]
    fn closing_parent_requires_children_closed_everywhere() {
        let (_dir, store) = store();
        let parent = store.create_issue("Parent", None).unwrap();
        let child = store.create_issue("Child", Some(&parent.id)).unwrap();

        assert!(matches!(
            store.close(&parent.id, None),
            Err(StoreError::ChildrenNotClosed { .. })
        ));

        store.close(&child.id, None).unwrap();
        store.close(&parent.id, None).unwrap();

        let dir = store.root().join(ARCHIVE_DIR).join(parent.id.to_string());
        assert!(dir.join(format!("{}.md", parent.id)).is_file());
    }

    #[test]
    fn activate_in_place() {
        let (_dir, store) = store();
        let issue = store.create_issue("Work", None).unwrap();

        store.activate(&issue.id).unwrap();

        assert_eq!(store.get(&issue.id).unwrap().status, Status::Active);
        assert!(store.root().join(format!("{}.md", issue.id)).is_file());
    }

    #[test]
    fn delete_ignores_child_status() {
        let (_dir, store) = store();
        let parent = store.create_issue("Parent", None).unwrap();
        store.create_issue("Child", Some(&parent.id)).unwrap();

        store.delete(&parent.id).unwrap();

        assert!(store.scan().unwrap().is_empty());
    }

    #[test]
    fn backlog_roundtrip() {
        let (_dir, store) = store();
        let plan = store.create_plan("Later", None, None).unwrap();
        let milestone = store.create_milestone(&plan.id, "Phase 1").unwrap();

        store.backlog(&plan.id).unwrap();
        assert!(store.root().join("backlog/p1-later/_plan.md").is_file());
        assert_eq!(
            store.find(&plan.id).unwrap().lifecycle,
            Lifecycle::Backlog
        );
        // subtree went along
        assert!(store.exists(&milestone.id).unwrap());

        store.unbacklog(&plan.id).unwrap();
        assert!(store.root().join("p1-later/_plan.md").is_file());
        assert_eq!(store.find(&plan.id).unwrap().lifecycle, Lifecycle::Active);
    }

    #[test]
    fn backlog_rejects_non_plans() {
        let (_dir, store) = store();
        let issue = store.create_issue("Not a plan", None).unwrap();

        assert!(matches!(
            store.backlog(&issue.id),
            Err(StoreError::WrongKind { .. })
        ));
    }

    #[test]
    fn resolve_prefix() {
        let (_dir, store) = store();
        let plan = store.create_plan("User Auth", None, None).unwrap();
        store.create_plan("Billing", None, None).unwrap();

        assert_eq!(store.resolve("p1").unwrap(), plan.id);
        assert_eq!(store.resolve("p1-user-auth").unwrap(), plan.id);
        assert!(matches!(
            store.resolve("p"),
            Err(StoreError::Ambiguous { .. })
        ));
        assert!(matches!(
            store.resolve("zzz"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn resolve_exact_match_wins_over_longer_ids() {
        let (_dir, store) = store();
        store.create_plan("Auth", None, None).unwrap();
        fs::create_dir_all(store.root().join("p1-auth-extended")).unwrap();
        let mut plan2 = Issue::new(
            "p1-auth-extended".parse().unwrap(),
            Kind::Plan,
            "Auth Extended",
        );
        plan2.seed_body();
        let store2 = IssueStore::new(store.root());
        store2
            .write_doc(
                &store.root().join("p1-auth-extended").join(PLAN_DOC),
                &plan2,
            )
            .unwrap();

        // "p1-auth" is a prefix of "p1-auth-extended" but matches exactly
        assert_eq!(store.resolve("p1-auth").unwrap().to_string(), "p1-auth");
    }

    #[test]
    fn resolve_searches_all_lifecycle_locations() {
        let (_dir, store) = store();
        let issue = store.create_issue("Archived thing", None).unwrap();
        store.close(&issue.id, None).unwrap();

        assert_eq!(store.resolve(&issue.id.to_string()).unwrap(), issue.id);
    }

    #[test]
    fn blocking_and_ready() {
        let (_dir, store) = store();
        let a = store.create_issue("First", None).unwrap();
        let b = store.create_issue("Second", None).unwrap();

        store.add_block(&b.id, &a.id).unwrap();

        let ready: Vec<_> = store.ready().unwrap().into_iter().map(|i| i.id).collect();
        assert!(ready.contains(&a.id));
        assert!(!ready.contains(&b.id));

        let blocked: Vec<_> = store.blocked().unwrap().into_iter().map(|i| i.id).collect();
        assert!(blocked.contains(&b.id));

        store.close(&a.id, None).unwrap();

        let ready: Vec<_> = store.ready().unwrap().into_iter().map(|i| i.id).collect();
        assert!(ready.contains(&b.id));
    }

    #[test]
    fn cycle_rejected_without_mutation() {
        let (_dir, store) = store();
        let a = store.create_issue("First", None).unwrap();
        let b = store.create_issue("Second", None).unwrap();
        let c = store.create_issue("Third", None).unwrap();

        store.add_block(&b.id, &a.id).unwrap();
        store.add_block(&c.id, &b.id).unwrap();

        let result = store.add_block(&a.id, &c.id);
        assert!(matches!(result, Err(StoreError::DependencyCycle { .. })));

        // neither endpoint changed
        assert!(store.get(&a.id).unwrap().blocks.is_empty());
        assert_eq!(store.get(&c.id).unwrap().blocks, vec![b.id]);
    }

    #[test]
    fn block_requires_both_ends() {
        let (_dir, store) = store();
        let a = store.create_issue("Only one", None).unwrap();
        let ghost: IssueId = "t-0000000".parse().unwrap();

        assert!(matches!(
            store.add_block(&a.id, &ghost),
            Err(StoreError::DependencyNotFound(_))
        ));
        assert!(store.get(&a.id).unwrap().blocks.is_empty());
    }

    #[test]
    fn append_section_touches_only_the_section() {
        let (_dir, store) = store();
        let plan = store.create_plan("User Auth", None, None).unwrap();
        let path = store.root().join("p1-user-auth").join(PLAN_DOC);

        let before = fs::read_to_string(&path).unwrap();
        store
            .append_section(&plan.id, "Progress", "- wired up login")
            .unwrap();
        let after = fs::read_to_string(&path).unwrap();

        // everything before the Progress section is unchanged
        let cut = before.find("## Progress").unwrap();
        assert_eq!(&before[..cut], &after[..cut]);
        assert!(after.contains("- wired up login"));
        // the following section survived
        assert!(after.contains("## Decision Log"));
    }

    #[test]
    fn purge_archive_leaves_done_alone() {
        let (_dir, store) = store();
        let issue = store.create_issue("Old", None).unwrap();
        store.close(&issue.id, None).unwrap();

        let plan = store.create_plan("Keep", None, None).unwrap();
        store.close(&plan.id, None).unwrap();

        let purged = store.purge_archive().unwrap();
        assert_eq!(purged, 1);

        assert!(matches!(
            store.resolve(&issue.id.to_string()),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.get(&plan.id).unwrap().status, Status::Closed);
    }

    #[test]
    fn allocation_ignores_reserved_dirs() {
        let (_dir, store) = store();
        for reserved in RESERVED_DIRS {
            fs::create_dir_all(store.root().join(reserved)).unwrap();
        }
        // reserved names never look like counters anyway, but even seeded
        // plan dirs inside them must not shadow the scan
        fs::create_dir_all(store.root().join("done/p7-ancient")).unwrap();

        let plan = store.create_plan("Fresh", None, None).unwrap();
        assert_eq!(plan.id.seq(), Some(1));
    }

    #[test]
    fn recreated_milestone_title_bumps_past_done() {
        let (_dir, store) = store();
        let plan = store.create_plan("Auth", None, None).unwrap();
        let first = store.create_milestone(&plan.id, "Setup").unwrap();
        store.close(&first.id, None).unwrap();

        // the closed milestone still owns m1-setup from done/
        let second = store.create_milestone(&plan.id, "Setup").unwrap();
        assert_eq!(second.id.to_string(), "m2-setup");
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn recreated_plan_title_bumps_past_done() {
        let (_dir, store) = store();
        let plan = store.create_plan("Cleanup", None, None).unwrap();
        store.close(&plan.id, None).unwrap();

        let second = store.create_plan("Cleanup", None, None).unwrap();
        assert_eq!(second.id.to_string(), "p2-cleanup");
    }

    #[test]
    fn backlogged_plan_keeps_its_id_reserved() {
        let (_dir, store) = store();
        let plan = store.create_plan("Auth", None, None).unwrap();
        store.backlog(&plan.id).unwrap();

        let second = store.create_plan("Auth", None, None).unwrap();
        assert_eq!(second.id.to_string(), "p2-auth");
        assert_eq!(store.resolve("p1-auth").unwrap(), plan.id);
        assert_eq!(store.resolve("p2-auth").unwrap(), second.id);
    }

    #[test]
    fn search_covers_all_locations() {
        let (_dir, store) = store();
        let open = store.create_issue("Fix login flow", None).unwrap();
        let closed = store.create_issue("Login audit", None).unwrap();
        store.close(&closed.id, None).unwrap();

        let hits = store.search("login").unwrap();
        let ids: Vec<_> = hits.iter().map(|l| l.issue.id.clone()).collect();

        assert!(ids.contains(&open.id));
        assert!(ids.contains(&closed.id));
    }
}
