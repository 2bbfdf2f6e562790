//! Output formatting for CLI commands

use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<crate::storage::OutputFormat> for OutputFormat {
    fn from(format: crate::storage::OutputFormat) -> Self {
        match format {
            crate::storage::OutputFormat::Text => OutputFormat::Text,
            crate::storage::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Text => {
                if let Ok(json) = serde_json::to_string_pretty(data) {
                    println!("{}", json);
                }
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(data) {
                    println!("{}", json);
                }
            }
        }
    }

    /// Prints a table row (text only, ignored in JSON mode)
    pub fn row(&self, columns: &[&str]) {
        if self.format == OutputFormat::Text {
            println!("{}", columns.join("\t"));
        }
    }

    /// Prints a blank line (text only)
    pub fn blank(&self) {
        if self.format == OutputFormat::Text {
            println!();
        }
    }

    /// Prints a debug message when verbose mode is on
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[grove] {}", message);
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}
