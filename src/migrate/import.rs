//! Bulk import from newline-delimited JSON
//!
//! Each line is one record in a fixed schema; malformed lines are counted
//! and skipped at the boundary rather than surfacing as errors deep inside
//! store logic. Import is three phases over a complete record set:
//!
//! 1. create every issue, parents before children
//! 2. attach blocking edges
//! 3. close everything the source already marked closed, deepest first
//!
//! The closing pass runs only once the full tree is present so that the
//! children-closed invariant and subtree relocation behave the same as they
//! would for interactive use.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::domain::{ts, Issue, IssueId, Kind, Status};
use crate::storage::{IssueStore, StoreError};

/// One imported record; unknown fields are ignored
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRecord {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub status: String,

    #[serde(default = "default_priority")]
    pub priority: u8,

    #[serde(default)]
    pub issue_type: Option<String>,

    #[serde(default)]
    pub assignee: Option<String>,

    pub created_at: String,

    #[serde(default)]
    pub closed_at: Option<String>,

    #[serde(default)]
    pub close_reason: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<ImportDependency>,
}

fn default_priority() -> u8 {
    crate::domain::PRIORITY_DEFAULT
}

/// A typed relation carried by an import record
#[derive(Debug, Clone, Deserialize)]
pub struct ImportDependency {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: RelationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RelationKind {
    #[serde(rename = "parent-child")]
    ParentChild,

    #[serde(rename = "blocks")]
    Blocks,
}

/// Outcome counters for a bulk import
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub edges: usize,
    pub closed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn skip(&mut self, context: impl Into<String>) {
        self.skipped += 1;
        self.errors.push(context.into());
    }
}

/// Imports newline-delimited JSON records into the store
pub fn import_records(
    store: &IssueStore,
    reader: impl BufRead,
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();
    let mut records = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ImportRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => summary.skip(format!("line {}: {}", lineno + 1, e)),
        }
    }

    let created = create_phase(store, &records, &mut summary)?;
    edge_phase(store, &records, &created, &mut summary)?;
    close_phase(store, &records, &created, &mut summary)?;

    Ok(summary)
}

/// Creates issues parents-first, looping until no record makes progress.
/// Records whose parent never materializes are skipped.
fn create_phase(
    store: &IssueStore,
    records: &[ImportRecord],
    summary: &mut ImportSummary,
) -> Result<HashSet<IssueId>, StoreError> {
    let mut created: HashSet<IssueId> = HashSet::new();
    let mut pending: Vec<&ImportRecord> = records.iter().collect();

    loop {
        let mut deferred = Vec::new();
        let mut progressed = false;

        for record in pending {
            let id: IssueId = match record.id.parse() {
                Ok(id) => id,
                Err(e) => {
                    summary.skip(format!("{}: {}", record.id, e));
                    continue;
                }
            };

            let parent = record
                .dependencies
                .iter()
                .find(|d| d.kind == RelationKind::ParentChild)
                .map(|d| d.id.parse::<IssueId>());
            let parent = match parent {
                Some(Ok(p)) => Some(p),
                Some(Err(e)) => {
                    summary.skip(format!("{}: parent: {}", record.id, e));
                    continue;
                }
                None => None,
            };

            // parent not created yet, maybe a later iteration
            if let Some(p) = &parent {
                if !created.contains(p) && !store.exists(p)? {
                    deferred.push(record);
                    continue;
                }
            }

            match build_issue(record, id.clone(), parent.clone()) {
                Ok(issue) => match store.create_with_id(&issue, parent.as_ref()) {
                    Ok(()) => {
                        created.insert(id);
                        summary.created += 1;
                        progressed = true;
                    }
                    Err(StoreError::AlreadyExists(_)) => {
                        summary.skip(format!("{}: already exists", record.id));
                    }
                    Err(e) => return Err(e),
                },
                Err(msg) => summary.skip(format!("{}: {}", record.id, msg)),
            }
        }

        if deferred.is_empty() {
            break;
        }
        if !progressed {
            for record in deferred {
                summary.skip(format!("{}: parent not found", record.id));
            }
            break;
        }
        pending = deferred;
    }

    Ok(created)
}

fn build_issue(
    record: &ImportRecord,
    id: IssueId,
    parent: Option<IssueId>,
) -> Result<Issue, String> {
    let status: Status = record.status.parse()?;
    let created_at = ts::parse(&record.created_at).map_err(|e| e.to_string())?;

    let kind = match record.issue_type.as_deref() {
        Some("plan") => Kind::Plan,
        Some("milestone") => Kind::Milestone,
        _ => Kind::Task,
    };

    let closed_at = match &record.closed_at {
        Some(s) => Some(ts::parse(s).map_err(|e| e.to_string())?),
        None => None,
    };

    if record.priority > crate::domain::PRIORITY_MAX {
        return Err(format!(
            "priority {} out of range (max {})",
            record.priority,
            crate::domain::PRIORITY_MAX
        ));
    }

    let mut issue = Issue::new(id, kind, record.title.clone());
    issue.status = status;
    issue.priority = record.priority;
    issue.assignee = record.assignee.clone();
    issue.created_at = created_at;
    issue.closed_at = closed_at;
    issue.close_reason = record.close_reason.clone();
    issue.parent = parent;
    issue.body = record.description.clone().unwrap_or_default();

    Ok(issue)
}

/// Attaches blocking edges once all issues exist. Missing targets and
/// cycles count as skips, not batch failures.
fn edge_phase(
    store: &IssueStore,
    records: &[ImportRecord],
    created: &HashSet<IssueId>,
    summary: &mut ImportSummary,
) -> Result<(), StoreError> {
    for record in records {
        let Ok(blockee) = record.id.parse::<IssueId>() else {
            continue;
        };
        if !created.contains(&blockee) {
            continue;
        }

        for dep in record
            .dependencies
            .iter()
            .filter(|d| d.kind == RelationKind::Blocks)
        {
            let blocker: IssueId = match dep.id.parse() {
                Ok(b) => b,
                Err(e) => {
                    summary.skip(format!("{}: blocker: {}", record.id, e));
                    continue;
                }
            };

            match store.add_block(&blockee, &blocker) {
                Ok(()) => summary.edges += 1,
                Err(
                    e @ (StoreError::DependencyNotFound(_) | StoreError::DependencyCycle { .. }),
                ) => summary.skip(format!("{}: {}", record.id, e)),
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

/// Relocates everything the source already closed, deepest first so that
/// children reach `done/` before their parents are checked. An issue whose
/// children are still open (because the source disagreed with itself) is
/// left in place without failing the batch.
fn close_phase(
    store: &IssueStore,
    records: &[ImportRecord],
    created: &HashSet<IssueId>,
    summary: &mut ImportSummary,
) -> Result<(), StoreError> {
    let parents: HashMap<IssueId, IssueId> = records
        .iter()
        .filter_map(|r| {
            let id: IssueId = r.id.parse().ok()?;
            let parent = r
                .dependencies
                .iter()
                .find(|d| d.kind == RelationKind::ParentChild)?
                .id
                .parse()
                .ok()?;
            Some((id, parent))
        })
        .collect();

    let mut to_close: Vec<(usize, IssueId, Option<String>)> = records
        .iter()
        .filter_map(|r| {
            let id: IssueId = r.id.parse().ok()?;
            if !created.contains(&id) {
                return None;
            }
            let status: Status = r.status.parse().ok()?;
            status
                .is_closed()
                .then(|| (depth(&id, &parents), id, r.close_reason.clone()))
        })
        .collect();
    to_close.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, id, reason) in to_close {
        match store.close(&id, reason) {
            Ok(_) => summary.closed += 1,
            Err(StoreError::ChildrenNotClosed { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn depth(id: &IssueId, parents: &HashMap<IssueId, IssueId>) -> usize {
    let mut d = 0;
    let mut cur = id;
    while let Some(p) = parents.get(cur) {
        d += 1;
        cur = p;
        if d > parents.len() {
            break; // malformed parent cycle in the source
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn store() -> (TempDir, IssueStore) {
        let dir = TempDir::new().unwrap();
        let store = IssueStore::new(dir.path().join("issues"));
        fs::create_dir_all(store.root()).unwrap();
        (dir, store)
    }

    fn run(store: &IssueStore, ndjson: &str) -> ImportSummary {
        import_records(store, Cursor::new(ndjson)).unwrap()
    }

    const CREATED: &str = "2025-01-02T03:04:05.000000+00:00";

    fn record(id: &str, title: &str, status: &str, deps: &str) -> String {
        format!(
            r#"{{"id":"{}","title":"{}","status":"{}","priority":2,"issue_type":"task","created_at":"{}","dependencies":[{}]}}"#,
            id, title, status, CREATED, deps
        )
    }

    #[test]
    fn imports_flat_records() {
        let (_dir, store) = store();
        let input = [
            record("t-1111111", "First", "open", ""),
            record("t-2222222", "Second", "in_progress", ""),
        ]
        .join("\n");

        let summary = run(&store, &input);

        assert_eq!(summary.created, 2);
        assert_eq!(summary.skipped, 0);
        let second = store.get(&"t-2222222".parse().unwrap()).unwrap();
        assert_eq!(second.status, Status::Active);
        assert_eq!(ts::to_string(&second.created_at), CREATED);
    }

    #[test]
    fn parents_created_regardless_of_record_order() {
        let (_dir, store) = store();
        // child line precedes its parent
        let input = [
            record(
                "t-2222222",
                "Child",
                "open",
                r#"{"id":"t-1111111","type":"parent-child"}"#,
            ),
            record("t-1111111", "Parent", "open", ""),
        ]
        .join("\n");

        let summary = run(&store, &input);

        assert_eq!(summary.created, 2);
        let child = store.get(&"t-2222222".parse().unwrap()).unwrap();
        assert_eq!(child.parent, Some("t-1111111".parse().unwrap()));
    }

    #[test]
    fn blocking_edges_attach_after_creation() {
        let (_dir, store) = store();
        let input = [
            record(
                "t-2222222",
                "Blocked",
                "open",
                r#"{"id":"t-1111111","type":"blocks"}"#,
            ),
            record("t-1111111", "Blocker", "open", ""),
        ]
        .join("\n");

        let summary = run(&store, &input);

        assert_eq!(summary.edges, 1);
        let blocked = store.get(&"t-2222222".parse().unwrap()).unwrap();
        assert_eq!(blocked.blocks, vec!["t-1111111".parse().unwrap()]);
    }

    #[test]
    fn closed_records_are_archived_deepest_first() {
        let (_dir, store) = store();
        let input = [
            record("t-1111111", "Parent", "done", ""),
            record(
                "t-2222222",
                "Child",
                "done",
                r#"{"id":"t-1111111","type":"parent-child"}"#,
            ),
        ]
        .join("\n");

        let summary = run(&store, &input);

        assert_eq!(summary.closed, 2);
        // both ended up under archive, child inside the parent's subtree
        let child = store.find(&"t-2222222".parse().unwrap()).unwrap();
        assert_eq!(child.lifecycle, crate::storage::Lifecycle::Archive);
    }

    #[test]
    fn bad_lines_are_counted_not_fatal() {
        let (_dir, store) = store();
        let input = format!(
            "not json at all\n{}\n{{\"id\":\"t-3333333\"}}\n",
            record("t-1111111", "Good", "open", "")
        );

        let summary = run(&store, &input);

        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.errors.len(), 2);
    }

    #[test]
    fn out_of_range_priority_skips_the_record() {
        let (_dir, store) = store();
        let input = format!(
            r#"{{"id":"t-1111111","title":"Too hot","status":"open","priority":9,"created_at":"{}"}}"#,
            CREATED
        );

        let summary = run(&store, &input);

        assert_eq!(summary.created, 0);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors[0].contains("priority 9 out of range"));
        assert!(!store.exists(&"t-1111111".parse().unwrap()).unwrap());
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let (_dir, store) = store();
        let input = [
            record("t-1111111", "First", "open", ""),
            record("t-1111111", "Again", "open", ""),
        ]
        .join("\n");

        let summary = run(&store, &input);

        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(store.get(&"t-1111111".parse().unwrap()).unwrap().title, "First");
    }

    #[test]
    fn missing_dependency_target_skips_edge_only() {
        let (_dir, store) = store();
        let input = record(
            "t-1111111",
            "Lonely",
            "open",
            r#"{"id":"t-9999999","type":"blocks"}"#,
        );

        let summary = run(&store, &input);

        assert_eq!(summary.created, 1);
        assert_eq!(summary.edges, 0);
        assert_eq!(summary.skipped, 1);
        assert!(store.get(&"t-1111111".parse().unwrap()).unwrap().blocks.is_empty());
    }

    #[test]
    fn closed_parent_with_open_child_stays_put() {
        let (_dir, store) = store();
        let input = [
            record("t-1111111", "Parent", "done", ""),
            record(
                "t-2222222",
                "Child",
                "open",
                r#"{"id":"t-1111111","type":"parent-child"}"#,
            ),
        ]
        .join("\n");

        let summary = run(&store, &input);

        // parent cannot archive yet, and that is not an error
        assert_eq!(summary.closed, 0);
        assert!(summary.errors.is_empty());
        let parent = store.find(&"t-1111111".parse().unwrap()).unwrap();
        assert_eq!(parent.lifecycle, crate::storage::Lifecycle::Active);
        assert_eq!(parent.issue.status, Status::Closed);
    }

    #[test]
    fn status_vocabulary_maps() {
        let (_dir, store) = store();
        let input = [
            record("t-1111111", "A", "todo", ""),
            record("t-2222222", "B", "in_progress", ""),
            record("t-3333333", "C", "complete", ""),
        ]
        .join("\n");

        run(&store, &input);

        assert_eq!(store.get(&"t-1111111".parse().unwrap()).unwrap().status, Status::Open);
        assert_eq!(store.get(&"t-2222222".parse().unwrap()).unwrap().status, Status::Active);
        assert_eq!(store.get(&"t-3333333".parse().unwrap()).unwrap().status, Status::Closed);
    }
}
