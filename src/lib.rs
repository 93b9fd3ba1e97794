// todolist - To-do list store with pluggable local persistence

pub mod config;
pub mod error;
pub mod filter;
pub mod storage;
pub mod store;
pub mod task;
pub mod view;

// Re-export main types for convenience
pub use error::{StorageError, TaskError};
pub use filter::Filter;
pub use storage::{FileStore, KeyValueStore, MemoryStore, SqliteStore};
pub use store::{Change, Stats, StoreOptions, TaskStore};
pub use task::{Task, TaskCollection, TaskId, now_ms};
