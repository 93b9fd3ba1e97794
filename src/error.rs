// Error types for task operations and storage backends

use crate::task::TaskId;
use thiserror::Error;

/// Errors from durable storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// The stored value under `key` could not be parsed as a task collection.
    #[error("Stored data under key {key:?} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The key is not usable as a storage entry name.
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("Failed to serialize task collection: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors returned by `TaskStore` operations
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task text was empty after trimming.
    #[error("Task text cannot be empty")]
    EmptyInput,

    #[error("No task with id {0}")]
    NotFound(TaskId),

    /// `clear_completed` was called with no completed tasks.
    #[error("No completed tasks to clear")]
    NothingToClear,

    /// Every id value is already taken.
    #[error("No free task id left")]
    IdsExhausted,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TaskError {
    pub fn is_validation(&self) -> bool {
        matches!(self, TaskError::EmptyInput)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskError::NotFound(_))
    }
}

pub type Result<T, E = TaskError> = std::result::Result<T, E>;
