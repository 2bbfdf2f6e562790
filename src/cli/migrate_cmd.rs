//! Import and archive maintenance commands

use std::fs::File;
use std::io::{BufReader, IsTerminal};

use anyhow::Result;

use super::output::Output;
use crate::migrate::import_records;
use crate::storage::Project;

pub fn import(output: &Output, file: Option<&str>) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.issue_store();

    let summary = match file {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            import_records(&store, reader)?
        }
        None => {
            let stdin = std::io::stdin();
            // a bare `grove import` with no pipe would block forever
            if stdin.is_terminal() {
                anyhow::bail!("No input: pass a file or pipe records to stdin");
            }
            import_records(&store, stdin.lock())?
        }
    };

    if output.is_json() {
        output.data(&summary);
        return Ok(());
    }

    output.success(&format!(
        "Imported {} issue(s), {} edge(s), archived {}, skipped {}",
        summary.created, summary.edges, summary.closed, summary.skipped
    ));
    for error in &summary.errors {
        output.verbose(&format!("skipped: {}", error));
    }
    Ok(())
}

pub fn purge(output: &Output, force: bool) -> Result<()> {
    if !force {
        anyhow::bail!("Purge permanently deletes the archive; pass --force to confirm");
    }

    let project = Project::open_current()?;
    let store = project.issue_store();

    let purged = store.purge_archive()?;
    output.success(&format!("Purged {} archived issue(s)", purged));
    Ok(())
}
