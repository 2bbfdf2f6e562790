//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{issue, migrate_cmd, plan, query};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "grove")]
#[command(author, version, about = "Issue tracking in a directory of markdown files")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config's `default_format`)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new grove project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Create a standalone issue
    New {
        /// Issue title
        title: String,

        /// Parent issue ID (must be a standalone issue)
        #[arg(long)]
        parent: Option<String>,

        /// Priority (0 critical .. 4 backlog)
        #[arg(long, short)]
        priority: Option<u8>,

        /// Assignee
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Manage execution plans
    #[command(subcommand)]
    Plan(plan::PlanCommands),

    /// Create a milestone under a plan
    Milestone {
        /// Plan ID (or unique prefix)
        plan: String,

        /// Milestone title
        title: String,
    },

    /// Create a task under a milestone
    Task {
        /// Milestone ID (or unique prefix)
        milestone: String,

        /// Task title
        title: String,
    },

    /// List issues
    List {
        /// Filter by status (open, active, closed)
        #[arg(long)]
        status: Option<String>,

        /// Filter by kind (task, plan, milestone)
        #[arg(long)]
        kind: Option<String>,

        /// Include done, backlog and archive locations
        #[arg(long, short)]
        all: bool,
    },

    /// Show issue details
    Show {
        /// Issue ID (or unique prefix)
        id: String,
    },

    /// Mark an issue as actively being worked on
    Start {
        /// Issue ID (or unique prefix)
        id: String,
    },

    /// Close an issue and relocate it
    Close {
        /// Issue ID (or unique prefix)
        id: String,

        /// Reason recorded with the close
        #[arg(long)]
        reason: Option<String>,
    },

    /// Delete an issue (and its whole subtree) permanently
    Delete {
        /// Issue ID (or unique prefix)
        id: String,
    },

    /// Record that an issue waits on another
    Dep {
        /// Issue that is blocked
        issue: String,

        /// Issue that must close first
        blocker: String,
    },

    /// Remove a blocking edge
    Undep {
        /// Issue to unblock
        issue: String,

        /// Blocker to remove
        blocker: String,
    },

    /// Show issues ready to work on
    Ready,

    /// Show blocked issues
    Blocked,

    /// Append an entry to an issue's Progress section
    Log {
        /// Issue ID (or unique prefix)
        id: String,

        /// Entry text
        #[arg(allow_hyphen_values = true)]
        entry: String,
    },

    /// Append an entry to a plan's Decision Log section
    Decision {
        /// Plan ID (or unique prefix)
        id: String,

        /// Entry text
        #[arg(allow_hyphen_values = true)]
        entry: String,
    },

    /// Search issue titles across all locations
    Search {
        /// Search query (case-insensitive substring)
        query: String,
    },

    /// Import issues from newline-delimited JSON
    Import {
        /// Input file (reads stdin when omitted)
        file: Option<String>,
    },

    /// Permanently delete everything in the archive
    Purge {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format.into(),
    };
    let output = Output::new(format, cli.verbose);

    match cli.command {
        Commands::Init { path } => {
            let project = Project::init(&path)?;
            output.success(&format!(
                "Initialized grove project at {}",
                project.root().display()
            ));
        }

        Commands::New {
            title,
            parent,
            priority,
            assignee,
        } => issue::new(&output, &title, parent.as_deref(), priority, assignee)?,

        Commands::Plan(cmd) => plan::run(cmd, &output)?,
        Commands::Milestone { plan, title } => plan::new_milestone(&output, &plan, &title)?,
        Commands::Task { milestone, title } => plan::new_task(&output, &milestone, &title)?,

        Commands::List { status, kind, all } => {
            issue::list(&output, status.as_deref(), kind.as_deref(), all)?
        }
        Commands::Show { id } => issue::show(&output, &id)?,
        Commands::Start { id } => issue::start(&output, &id)?,
        Commands::Close { id, reason } => issue::close(&output, &id, reason)?,
        Commands::Delete { id } => issue::delete(&output, &id)?,

        Commands::Dep { issue, blocker } => issue::add_dep(&output, &issue, &blocker)?,
        Commands::Undep { issue, blocker } => issue::remove_dep(&output, &issue, &blocker)?,

        Commands::Ready => query::ready(&output)?,
        Commands::Blocked => query::blocked(&output)?,

        Commands::Log { id, entry } => issue::log(&output, &id, &entry)?,
        Commands::Decision { id, entry } => issue::decision(&output, &id, &entry)?,

        Commands::Search { query } => issue::search(&output, &query)?,

        Commands::Import { file } => migrate_cmd::import(&output, file.as_deref())?,
        Commands::Purge { force } => migrate_cmd::purge(&output, force)?,
    }

    Ok(())
}
