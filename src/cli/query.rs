//! Readiness queries

use anyhow::Result;

use super::output::Output;
use crate::domain::Issue;
use crate::storage::Project;

pub fn ready(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let mut issues = store.ready()?;
    sort_for_display(&mut issues);
    render(output, &issues, "Nothing is ready");
    Ok(())
}

pub fn blocked(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let mut issues = store.blocked()?;
    sort_for_display(&mut issues);
    render(output, &issues, "Nothing is blocked");
    Ok(())
}

/// Highest priority first, then by ID for a stable listing
fn sort_for_display(issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
    });
}

fn render(output: &Output, issues: &[Issue], empty_message: &str) {
    if output.is_json() {
        let rows: Vec<_> = issues
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id.to_string(),
                    "title": i.title,
                    "priority": i.priority,
                    "blocked_by": i.blocks.iter().map(|b| b.to_string()).collect::<Vec<_>>(),
                })
            })
            .collect();
        output.data(&rows);
        return;
    }

    if issues.is_empty() {
        output.success(empty_message);
        return;
    }
    for issue in issues {
        output.row(&[&issue.summary_line()]);
    }
}
