//! `taskboard init`: config directory, default config file, database schema.

use anyhow::{Context, Result};
use std::path::Path;

use taskboard::config::{BoardConfig, CONFIG_FILE};
use taskboard::store::SqliteStore;

use super::Workspace;
use crate::Cli;

pub fn cmd_init(project_dir: &Path, cli: &Cli) -> Result<()> {
    let ws = Workspace::open(project_dir, cli)?;
    let config_path = ws.config_dir.join(CONFIG_FILE);
    let was_initialized = config_path.exists();

    std::fs::create_dir_all(&ws.config_dir)
        .with_context(|| format!("Failed to create {}", ws.config_dir.display()))?;
    if !was_initialized {
        BoardConfig::default().save(&config_path)?;
    }
    // Opening runs the migrations.
    SqliteStore::open(&ws.db_path)?;

    if was_initialized {
        println!("Taskboard already initialized at {}", ws.config_dir.display());
        println!("Database schema verified.");
    } else {
        println!("Initialized taskboard at {}", ws.config_dir.display());
        println!();
        println!("  .taskboard/");
        println!("  ├── taskboard.toml   # store, session, drag and board defaults");
        println!("  └── board.db         # SQLite database (unless db_path is set)");
        println!();
        println!("Next steps:");
        println!("  1. Set [session] user_id in taskboard.toml (or TASKBOARD_USER)");
        println!("  2. Run `taskboard boards create <title>`");
    }
    Ok(())
}
