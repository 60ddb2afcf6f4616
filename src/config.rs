//! Board configuration read from `.taskboard/taskboard.toml`.
//!
//! Settings are layered file → environment → CLI. A missing file means
//! defaults; the CLI applies its own flags on top of [`BoardConfig`].
//!
//! # Configuration File Format
//!
//! ```toml
//! [store]
//! db_path = "board.db"        # relative paths resolve against .taskboard/
//!
//! [session]
//! user_id = "ada"
//!
//! [drag]
//! activation_distance = 8.0
//!
//! [boards]
//! default_color = "bg-blue-500"
//! default_columns = ["To Do", "In Progress", "In Review", "Done"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::drag::DEFAULT_ACTIVATION_DISTANCE;
use crate::models::DEFAULT_BOARD_COLOR;
use crate::store::default_column_titles;

pub const CONFIG_DIR: &str = ".taskboard";
pub const CONFIG_FILE: &str = "taskboard.toml";
pub const DEFAULT_DB_FILE: &str = "board.db";

pub const ENV_DB: &str = "TASKBOARD_DB";
pub const ENV_USER: &str = "TASKBOARD_USER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    /// SQLite file; relative to the config directory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragSection {
    /// Pointer travel before a press becomes a drag.
    #[serde(default = "default_activation_distance")]
    pub activation_distance: f64,
}

impl Default for DragSection {
    fn default() -> Self {
        Self {
            activation_distance: default_activation_distance(),
        }
    }
}

fn default_activation_distance() -> f64 {
    DEFAULT_ACTIVATION_DISTANCE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardsSection {
    #[serde(default = "default_color")]
    pub default_color: String,
    /// Columns created with every new board, left to right.
    #[serde(default = "default_column_titles")]
    pub default_columns: Vec<String>,
}

impl Default for BoardsSection {
    fn default() -> Self {
        Self {
            default_color: default_color(),
            default_columns: default_column_titles(),
        }
    }
}

fn default_color() -> String {
    DEFAULT_BOARD_COLOR.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub drag: DragSection,
    #[serde(default)]
    pub boards: BoardsSection,
}

impl BoardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse taskboard.toml")
    }

    /// Load `taskboard.toml` from `config_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize taskboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Database path (env → file → `<config_dir>/board.db`).
    pub fn db_path(&self, config_dir: &Path) -> PathBuf {
        self.resolve_db_path(config_dir, std::env::var(ENV_DB).ok())
    }

    fn resolve_db_path(&self, config_dir: &Path, env_value: Option<String>) -> PathBuf {
        if let Some(path) = env_value.filter(|v| !v.trim().is_empty()) {
            return PathBuf::from(path);
        }
        match &self.store.db_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => config_dir.join(path),
            None => config_dir.join(DEFAULT_DB_FILE),
        }
    }

    /// Signed-in user (env → file). Blank values count as signed out.
    pub fn user_id(&self) -> Option<String> {
        self.resolve_user_id(std::env::var(ENV_USER).ok())
    }

    fn resolve_user_id(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .or_else(|| self.session.user_id.clone())
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let distance = self.drag.activation_distance;
        if !distance.is_finite() || distance < 0.0 {
            warnings.push(format!(
                "Invalid activation_distance '{}': should be a non-negative number",
                distance
            ));
        }

        if self.boards.default_color.trim().is_empty() {
            warnings.push("default_color must not be empty".to_string());
        }

        if self.boards.default_columns.is_empty() {
            warnings.push("default_columns is empty: new boards will have no columns".to_string());
        }
        for (i, title) in self.boards.default_columns.iter().enumerate() {
            if title.trim().is_empty() {
                warnings.push(format!("default_columns[{}] must not be blank", i));
            }
        }

        warnings
    }
}

/// Resolve the config directory for a project directory.
pub fn config_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR)
}
