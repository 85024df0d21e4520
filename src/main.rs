//! # ckl - Terminal Checklist
//!
//! A keyboard-driven checklist for short tasks, with local SQLite
//! persistence.
//!
//! ## Key Features
//!
//! - **Single-Screen Checklist**: add, edit, tick off and delete tasks from
//!   one list, with explicit confirmation before anything is destroyed
//! - **Local Record Store**: tasks live in one SQLite file; the list is
//!   loaded once at startup and re-persisted after every change
//! - **Non-Blocking Persistence**: saves are queued to a background writer,
//!   so the interface never waits on disk
//!
//! ## Quick Start
//!
//! ```bash
//! # Launch the checklist
//! ckl
//!
//! # Use a specific database file
//! ckl --db ~/notes/errands.db
//! ```
//!
//! ## Key Bindings
//!
//! - `a` - add a task (blank input is ignored)
//! - `e` - edit the selected task
//! - `Space` - toggle completion
//! - `d` - delete the selected task, after a y/n confirmation
//! - `h` - help screen with the full key map
//!
//! Data is stored locally in `~/.checklist/` along with rotating diagnostic
//! logs; persistence problems never interrupt the session, they are written
//! to the logs and the list keeps working from memory.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

pub mod cli;
pub mod logging;
pub mod store;
pub mod task;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod run;
    pub mod utils;
}

use cli::Cli;
use store::Store;

fn main() {
    let cli = Cli::parse();

    // Determine the data directory
    let data_dir = if let Some(db_path) = cli.db.as_ref() {
        db_path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .to_path_buf()
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let dir = PathBuf::from(home).join(".checklist");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("Failed to create data directory {}: {}", dir.display(), e);
            std::process::exit(1);
        }
        dir
    };

    // Diagnostics go to files from here on; the TUI owns the terminal.
    let level = cli.log_level.as_deref().unwrap_or(logging::default_log_level());
    let _logger = match logging::init_logging(level, &data_dir.join("logs")) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Logging disabled: {e}");
            None
        }
    };

    let db_path = cli.db.unwrap_or_else(|| data_dir.join("tasks.db"));
    let store = match Store::open(&db_path) {
        Ok(store) => {
            info!("opened task store at {}", db_path.display());
            store
        }
        Err(e) => {
            // Store-open failures are swallowed: the session continues on an
            // in-memory store and its contents are lost at exit.
            error!(
                "failed to open task store at {}, falling back to in-memory: {e}",
                db_path.display()
            );
            match Store::open_in_memory() {
                Ok(store) => store,
                Err(e) => {
                    eprintln!("Failed to open any task store: {e}");
                    std::process::exit(1);
                }
            }
        }
    };

    if let Err(e) = tui::run::run_tui(Arc::new(store)) {
        eprintln!("UI error: {e}");
        std::process::exit(1);
    }
}
