//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use syncboard_core::SyncStatus;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the status of a single data source
    pub fn print_status(&self, id: &str, status: SyncStatus) {
        match self.format {
            OutputFormat::Human => println!("{}: {}", id, status),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"id": id, "status": status}));
            }
            OutputFormat::Quiet => println!("{}", status),
        }
    }

    /// Print statuses for several data sources; `None` means the server
    /// did not report the id
    pub fn print_statuses(&self, rows: &[(String, Option<SyncStatus>)]) {
        match self.format {
            OutputFormat::Human => {
                for (id, status) in rows {
                    match status {
                        Some(status) => println!("{}: {}", id, status),
                        None => println!("{}: (unknown)", id),
                    }
                }
            }
            OutputFormat::Json => {
                let json_rows: Vec<_> = rows
                    .iter()
                    .map(|(id, status)| serde_json::json!({"id": id, "status": status}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json_rows).unwrap());
            }
            OutputFormat::Quiet => {
                for (_, status) in rows {
                    match status {
                        Some(status) => println!("{}", status),
                        None => println!("unknown"),
                    }
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}
