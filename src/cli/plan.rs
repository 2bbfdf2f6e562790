//! Plan hierarchy CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::storage::Project;

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a new plan
    New {
        /// Plan title
        title: String,

        /// Scope statement
        #[arg(long)]
        scope: Option<String>,

        /// Acceptance criteria
        #[arg(long)]
        acceptance: Option<String>,
    },

    /// Park a plan in the backlog
    Backlog {
        /// Plan ID (or unique prefix)
        id: String,
    },

    /// Restore a plan from the backlog
    Unbacklog {
        /// Plan ID (or unique prefix)
        id: String,
    },
}

pub fn run(cmd: PlanCommands, output: &Output) -> Result<()> {
    match cmd {
        PlanCommands::New {
            title,
            scope,
            acceptance,
        } => new_plan(output, &title, scope, acceptance),
        PlanCommands::Backlog { id } => backlog(output, &id),
        PlanCommands::Unbacklog { id } => unbacklog(output, &id),
    }
}

fn new_plan(
    output: &Output,
    title: &str,
    scope: Option<String>,
    acceptance: Option<String>,
) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let plan = store.create_plan(title, scope, acceptance)?;

    if output.is_json() {
        output.data(&serde_json::json!({ "id": plan.id.to_string() }));
    } else {
        output.success(&format!("Created plan {}", plan.id));
    }
    Ok(())
}

pub fn new_milestone(output: &Output, plan: &str, title: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let plan_id = store.resolve(plan)?;
    let milestone = store.create_milestone(&plan_id, title)?;

    if output.is_json() {
        output.data(&serde_json::json!({ "id": milestone.id.to_string() }));
    } else {
        output.success(&format!("Created milestone {} under {}", milestone.id, plan_id));
    }
    Ok(())
}

pub fn new_task(output: &Output, milestone: &str, title: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let milestone_id = store.resolve(milestone)?;
    let task = store.create_task(&milestone_id, title)?;

    if output.is_json() {
        output.data(&serde_json::json!({ "id": task.id.to_string() }));
    } else {
        output.success(&format!("Created task {} under {}", task.id, milestone_id));
    }
    Ok(())
}

fn backlog(output: &Output, prefix: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let id = store.resolve(prefix)?;
    store.backlog(&id)?;
    output.success(&format!("Moved {} to the backlog", id));
    Ok(())
}

fn unbacklog(output: &Output, prefix: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let id = store.resolve(prefix)?;
    store.unbacklog(&id)?;
    output.success(&format!("Restored {} from the backlog", id));
    Ok(())
}
