//! Issue CLI commands

use anyhow::Result;

use super::output::Output;
use crate::domain::{display_time, Kind, Status};
use crate::storage::{check_priority, Lifecycle, Located, Project};

pub fn new(
    output: &Output,
    title: &str,
    parent: Option<&str>,
    priority: Option<u8>,
    assignee: Option<String>,
) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let parent_id = match parent {
        Some(prefix) => Some(store.resolve(prefix)?),
        None => None,
    };

    let mut issue = store.create_issue(title, parent_id.as_ref())?;

    let priority = match priority {
        Some(p) => check_priority(p)?,
        None => project.config().project.default_priority,
    };
    let assignee = assignee.or_else(|| project.config().project.default_assignee.clone());
    if priority != issue.priority || assignee.is_some() {
        issue.priority = priority;
        issue.assignee = assignee;
        store.update(&issue)?;
    }

    if output.is_json() {
        output.data(&serde_json::json!({ "id": issue.id.to_string() }));
    } else {
        output.success(&format!("Created issue {}", issue.id));
    }
    Ok(())
}

pub fn list(output: &Output, status: Option<&str>, kind: Option<&str>, all: bool) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let status_filter: Option<Status> = match status {
        Some(s) => Some(s.parse().map_err(anyhow::Error::msg)?),
        None => None,
    };
    let kind_filter: Option<Kind> = match kind {
        Some(k) => Some(k.parse().map_err(anyhow::Error::msg)?),
        None => None,
    };

    let issues: Vec<Located> = store
        .scan()?
        .into_iter()
        .filter(|l| all || l.lifecycle == Lifecycle::Active)
        .filter(|l| status_filter.map_or(true, |s| l.issue.status == s))
        .filter(|l| kind_filter.map_or(true, |k| l.issue.kind == k))
        .collect();

    render_list(output, &issues);
    Ok(())
}

pub fn show(output: &Output, prefix: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let id = store.resolve(prefix)?;
    let located = store.find(&id)?;
    let issue = &located.issue;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": issue.id.to_string(),
            "title": issue.title,
            "status": issue.status,
            "priority": issue.priority,
            "kind": issue.kind,
            "assignee": issue.assignee,
            "created_at": crate::domain::ts::to_string(&issue.created_at),
            "closed_at": issue.closed_at.map(|t| crate::domain::ts::to_string(&t)),
            "close_reason": issue.close_reason,
            "blocked_by": issue.blocks.iter().map(|b| b.to_string()).collect::<Vec<_>>(),
            "parent": issue.parent.as_ref().map(|p| p.to_string()),
            "lifecycle": located.lifecycle,
            "body": issue.body,
        }));
        return Ok(());
    }

    output.row(&[&issue.id.to_string(), &issue.title]);
    output.row(&["status", &issue.status.to_string()]);
    output.row(&["kind", &issue.kind.to_string()]);
    output.row(&["priority", &format!("P{}", issue.priority)]);
    if let Some(assignee) = &issue.assignee {
        output.row(&["assignee", assignee]);
    }
    output.row(&["created", &display_time(&issue.created_at)]);
    if let Some(closed) = &issue.closed_at {
        output.row(&["closed", &display_time(closed)]);
    }
    if let Some(reason) = &issue.close_reason {
        output.row(&["reason", reason]);
    }
    if let Some(parent) = &issue.parent {
        output.row(&["parent", &parent.to_string()]);
    }
    for blocker in &issue.blocks {
        output.row(&["blocked by", &blocker.to_string()]);
    }
    if !issue.body.trim().is_empty() {
        output.blank();
        output.row(&[&issue.body]);
    }
    Ok(())
}

pub fn start(output: &Output, prefix: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let id = store.resolve(prefix)?;
    let issue = store.activate(&id)?;
    output.success(&format!("Started {}", issue.id));
    Ok(())
}

pub fn close(output: &Output, prefix: &str, reason: Option<String>) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let id = store.resolve(prefix)?;
    let located = store.close(&id, reason)?;
    output.success(&format!(
        "Closed {} (now in {})",
        id,
        located.path.display()
    ));
    Ok(())
}

pub fn delete(output: &Output, prefix: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let id = store.resolve(prefix)?;
    store.delete(&id)?;
    output.success(&format!("Deleted {}", id));
    Ok(())
}

pub fn add_dep(output: &Output, issue: &str, blocker: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let blockee = store.resolve(issue)?;
    let blocker = store.resolve(blocker)?;
    store.add_block(&blockee, &blocker)?;
    output.success(&format!("{} now waits on {}", blockee, blocker));
    Ok(())
}

pub fn remove_dep(output: &Output, issue: &str, blocker: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let blockee = store.resolve(issue)?;
    let blocker = store.resolve(blocker)?;
    store.remove_block(&blockee, &blocker)?;
    output.success(&format!("{} no longer waits on {}", blockee, blocker));
    Ok(())
}

pub fn log(output: &Output, prefix: &str, entry: &str) -> Result<()> {
    append(output, prefix, "Progress", entry)
}

pub fn decision(output: &Output, prefix: &str, entry: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let id = store.resolve(prefix)?;
    let issue = store.get(&id)?;
    if issue.kind != Kind::Plan {
        anyhow::bail!("{} is not a plan", id);
    }

    store.append_section(&id, "Decision Log", entry)?;
    output.success(&format!("Recorded decision on {}", id));
    Ok(())
}

fn append(output: &Output, prefix: &str, section: &str, entry: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let id = store.resolve(prefix)?;
    store.append_section(&id, section, entry)?;
    output.success(&format!("Logged on {}", id));
    Ok(())
}

pub fn search(output: &Output, query: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let hits = store.search(query)?;
    render_list(output, &hits);
    Ok(())
}

pub fn render_list(output: &Output, issues: &[Located]) {
    if output.is_json() {
        let rows: Vec<_> = issues
            .iter()
            .map(|l| {
                serde_json::json!({
                    "id": l.issue.id.to_string(),
                    "title": l.issue.title,
                    "status": l.issue.status,
                    "priority": l.issue.priority,
                    "kind": l.issue.kind,
                    "lifecycle": l.lifecycle,
                })
            })
            .collect();
        output.data(&rows);
        return;
    }

    if issues.is_empty() {
        output.success("No issues");
        return;
    }
    for located in issues {
        output.row(&[&located.issue.summary_line()]);
    }
}
