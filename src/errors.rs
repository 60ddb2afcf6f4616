//! Typed error hierarchy for the task board.
//!
//! Two enums cover the two layers:
//! - `StoreError`: what a record store implementation reports
//! - `BoardError`: what the mutator records in its error slot

use thiserror::Error;

/// Entity kinds, used to make not-found errors readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Board,
    Column,
    Task,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Board => write!(f, "Board"),
            Entity::Column => write!(f, "Column"),
            Entity::Task => write!(f, "Task"),
        }
    }
}

/// Errors from a record store (the persistence collaborator).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Record store unavailable: {0}")]
    Transport(String),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wrap an adapter-internal failure (SQLite, lock poisoning, join error).
    pub fn transport(err: anyhow::Error) -> Self {
        Self::Transport(format!("{:#}", err))
    }
}

/// Errors surfaced at the mutator boundary.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Board not loaded")]
    BoardNotLoaded,

    #[error("No column available to add task")]
    NoColumn,

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Transport(String),
}

impl From<StoreError> for BoardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => BoardError::NotFound { entity, id },
            StoreError::Validation(msg) => BoardError::Validation(msg),
            StoreError::Transport(msg) => BoardError::Transport(msg),
        }
    }
}

/// Reject empty or whitespace-only titles before anything touches state.
pub fn require_title(kind: Entity, title: &str) -> Result<String, BoardError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(BoardError::Validation(format!("{} title must not be empty", kind)));
    }
    Ok(trimmed.to_string())
}
