use std::path::PathBuf;

use clap::Parser;

/// Keyboard-driven terminal checklist.
/// Storage defaults to ~/.checklist/tasks.db or a path passed via --db.
#[derive(Parser)]
#[command(name = "ckl", version, about = "Terminal checklist for short tasks")]
pub struct Cli {
    /// Path to the SQLite database file.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Diagnostic log level (trace|debug|info|warn|error).
    #[arg(long)]
    pub log_level: Option<String>,
}
