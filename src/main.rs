//! Grove CLI - issue tracking in a directory of markdown files

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = grove_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
