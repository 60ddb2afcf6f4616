use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Kanban boards with optimistic local edits")]
pub struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// SQLite database file (overrides TASKBOARD_DB and taskboard.toml)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Acting user (overrides TASKBOARD_USER and taskboard.toml)
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .taskboard/ with a default config and an empty database
    Init,
    /// List, create or delete boards
    Boards {
        #[command(subcommand)]
        command: BoardsCommands,
    },
    /// Show a board's columns and tasks
    Show {
        /// Board id or title
        board: String,
        /// Only these priorities (repeatable)
        #[arg(long = "priority")]
        priorities: Vec<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// Only tasks due on or before this date (YYYY-MM-DD)
        #[arg(long)]
        due_before: Option<String>,
    },
    /// Add, rename or delete columns
    Column {
        #[command(subcommand)]
        command: ColumnCommands,
    },
    /// Add, move or delete tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum BoardsCommands {
    List {
        /// Case-insensitive title search
        #[arg(long)]
        search: Option<String>,
        /// Created on or after this day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Created on or before this day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Display color token, e.g. bg-green-500
        #[arg(long)]
        color: Option<String>,
    },
    Delete {
        /// Board id or title
        board: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum ColumnCommands {
    Add {
        board: String,
        title: String,
    },
    Rename {
        board: String,
        /// Column id or title
        column: String,
        title: String,
    },
    Delete {
        board: String,
        column: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum TaskCommands {
    Add {
        board: String,
        title: String,
        /// Column id or title (defaults to the first column)
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// low, medium or high
        #[arg(long)]
        priority: Option<String>,
    },
    Move {
        board: String,
        /// Task id or title
        task: String,
        /// Target column id or title
        column: String,
        /// Zero-based position in the target column
        index: usize,
    },
    Delete {
        board: String,
        task: String,
    },
}

fn init_tracing(verbose: bool, log_json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir, &cli)?,
        Commands::Boards { command } => cmd::cmd_boards(&project_dir, &cli, command).await?,
        Commands::Show {
            board,
            priorities,
            assignee,
            due_before,
        } => {
            let filter = cmd::parse_filter(priorities, assignee.as_deref(), due_before.as_deref())?;
            cmd::cmd_show(&project_dir, &cli, board, filter).await?
        }
        Commands::Column { command } => cmd::cmd_column(&project_dir, &cli, command).await?,
        Commands::Task { command } => cmd::cmd_task(&project_dir, &cli, command).await?,
    }

    Ok(())
}
