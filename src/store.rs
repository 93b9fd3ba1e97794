// TaskStore: in-memory task list backed by a key-value store

use crate::error::{Result, StorageError, TaskError};
use crate::filter::Filter;
use crate::storage::KeyValueStore;
use crate::task::{Task, TaskCollection, TaskId, now_ms};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Storage key used by the browser widget
pub const DEFAULT_STORAGE_KEY: &str = "todoTasks";

/// Options fixed for the lifetime of a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Entry name the collection is persisted under
    pub key: String,
    /// Record `createdAt` on new tasks
    pub timestamps: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_STORAGE_KEY.to_string(),
            timestamps: true,
        }
    }
}

/// Task and completion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
}

impl Stats {
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

/// What changed, delivered to observers after each successful mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Added(Task),
    Edited(Task),
    Deleted(TaskId),
    Toggled(Task),
    Cleared(usize),
    FilterChanged(Filter),
}

type Observer = Box<dyn FnMut(&Change)>;

/// Owns the task collection and the active filter
///
/// Every mutation is applied to a copy of the collection, written to the
/// backend, and only then committed in memory. A failed write leaves the
/// store exactly as it was.
pub struct TaskStore<S: KeyValueStore> {
    backend: S,
    options: StoreOptions,
    tasks: TaskCollection,
    filter: Filter,
    last_load_error: Option<StorageError>,
    observers: Vec<Observer>,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Create a store over `backend` and load the persisted collection
    ///
    /// Fails only when the backend cannot be read; see `load`.
    pub fn open(backend: S, options: StoreOptions) -> Result<Self, StorageError> {
        let mut store = Self {
            backend,
            options,
            tasks: TaskCollection::new(),
            filter: Filter::All,
            last_load_error: None,
            observers: Vec::new(),
        };
        store.load()?;
        Ok(store)
    }

    /// Reload the collection from the backend
    ///
    /// Absent data loads as an empty collection. Corrupt data also loads as
    /// empty; the error is kept in `last_load_error`. A failed read is
    /// returned and leaves the store untouched, so intact data is never
    /// overwritten by an empty list. The filter resets to `All`.
    pub fn load(&mut self) -> Result<&TaskCollection, StorageError> {
        let loaded = match Self::read_collection(&self.backend, &self.options.key) {
            Ok(tasks) => {
                info!(key = %self.options.key, count = tasks.len(), "Loaded tasks");
                self.last_load_error = None;
                tasks
            }
            Err(e @ StorageError::Corrupt { .. }) => {
                warn!(key = %self.options.key, error = %e, "Stored tasks are corrupt, starting empty");
                self.last_load_error = Some(e);
                TaskCollection::new()
            }
            Err(e) => {
                warn!(key = %self.options.key, error = %e, "Failed to read tasks");
                return Err(e);
            }
        };
        self.tasks = loaded;
        self.filter = Filter::All;
        Ok(&self.tasks)
    }

    fn read_collection(backend: &S, key: &str) -> Result<TaskCollection, StorageError> {
        let Some(raw) = backend.get(key)? else {
            debug!(key, "No stored tasks");
            return Ok(TaskCollection::new());
        };
        if raw.trim().is_empty() {
            return Ok(TaskCollection::new());
        }
        TaskCollection::from_json(&raw).map_err(|source| StorageError::Corrupt {
            key: key.to_string(),
            source,
        })
    }

    /// Write the full collection to the backend
    pub fn save(&mut self) -> Result<()> {
        Self::write_collection(&mut self.backend, &self.options.key, &self.tasks)?;
        Ok(())
    }

    fn write_collection(backend: &mut S, key: &str, tasks: &TaskCollection) -> Result<(), StorageError> {
        let json = tasks.to_json().map_err(StorageError::Serialize)?;
        backend.set(key, &json)?;
        debug!(key, count = tasks.len(), "Saved tasks");
        Ok(())
    }

    /// Persist `next` and make it the current collection
    fn commit(&mut self, next: TaskCollection, change: Change) -> Result<()> {
        Self::write_collection(&mut self.backend, &self.options.key, &next)?;
        self.tasks = next;
        self.notify(&change);
        Ok(())
    }

    fn notify(&mut self, change: &Change) {
        for observer in &mut self.observers {
            observer(change);
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Add a task at the front of the list
    pub fn add_task(&mut self, raw_text: &str) -> Result<Task> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(TaskError::EmptyInput);
        }

        let id = self.tasks.next_id(now_ms()).ok_or(TaskError::IdsExhausted)?;
        let mut task = Task::new(id, text);
        if self.options.timestamps {
            task = task.with_created_at(Utc::now());
        }
        debug!(id = %task.id, "add_task");

        let mut next = self.tasks.clone();
        next.prepend(task.clone());
        self.commit(next, Change::Added(task.clone()))?;
        Ok(task)
    }

    /// Replace a task's text
    pub fn edit_task(&mut self, id: TaskId, raw_text: &str) -> Result<Task> {
        if !self.tasks.contains(id) {
            return Err(TaskError::NotFound(id));
        }
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(TaskError::EmptyInput);
        }
        debug!(%id, "edit_task");

        let mut next = self.tasks.clone();
        let task = next.get_mut(id).ok_or(TaskError::NotFound(id))?;
        task.text = text.to_string();
        let edited = task.clone();
        self.commit(next, Change::Edited(edited.clone()))?;
        Ok(edited)
    }

    /// Remove a task immediately
    pub fn delete_task(&mut self, id: TaskId) -> Result<()> {
        let mut next = self.tasks.clone();
        next.remove(id).ok_or(TaskError::NotFound(id))?;
        debug!(%id, "delete_task");
        self.commit(next, Change::Deleted(id))
    }

    /// Flip a task's completed flag
    pub fn toggle_task(&mut self, id: TaskId) -> Result<Task> {
        let mut next = self.tasks.clone();
        let task = next.get_mut(id).ok_or(TaskError::NotFound(id))?;
        task.completed = !task.completed;
        let toggled = task.clone();
        debug!(%id, completed = toggled.completed, "toggle_task");
        self.commit(next, Change::Toggled(toggled.clone()))?;
        Ok(toggled)
    }

    /// Remove every completed task, returning how many were removed
    ///
    /// Any confirmation belongs to the caller and happens before this call.
    pub fn clear_completed(&mut self) -> Result<usize> {
        if self.tasks.completed_count() == 0 {
            return Err(TaskError::NothingToClear);
        }
        let mut next = self.tasks.clone();
        let removed = next.remove_completed();
        debug!(removed, "clear_completed");
        self.commit(next, Change::Cleared(removed))?;
        Ok(removed)
    }

    /// Change the active filter. Not persisted.
    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.notify(&Change::FilterChanged(filter));
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Tasks matching the active filter, in collection order
    pub fn filtered_tasks(&self) -> Vec<&Task> {
        let filter = self.filter;
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            total: self.tasks.len(),
            completed: self.tasks.completed_count(),
        }
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> &TaskCollection {
        &self.tasks
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.completed_count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// The error recovered from during the last `load`, if any
    pub fn last_load_error(&self) -> Option<&StorageError> {
        self.last_load_error.as_ref()
    }

    /// Register a callback run after every successful change
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&Change) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn open_memory() -> TaskStore<MemoryStore> {
        TaskStore::open(MemoryStore::new(), StoreOptions::default()).unwrap()
    }

    fn texts(store: &TaskStore<impl KeyValueStore>) -> Vec<String> {
        store.tasks().iter().map(|t| t.text.clone()).collect()
    }

    /// Backend whose reads and writes can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if self.fail_reads {
                return Err(std::io::Error::other("read failed").into());
            }
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_add_prepends_and_trims() {
        let mut store = open_memory();
        store.add_task("Buy milk").unwrap();
        let task = store.add_task("  Walk dog \n").unwrap();

        assert_eq!(task.text, "Walk dog");
        assert!(!task.completed);
        assert!(task.created_at.is_some());
        assert_eq!(texts(&store), vec!["Walk dog", "Buy milk"]);
    }

    #[test]
    fn test_add_whitespace_is_rejected() {
        let mut store = open_memory();
        store.add_task("keep").unwrap();

        let err = store.add_task(" \t\n").unwrap_err();
        assert!(matches!(err, TaskError::EmptyInput));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_generates_unique_ids() {
        let mut store = open_memory();
        let ids: Vec<TaskId> = (0..20).map(|i| store.add_task(&format!("t{}", i)).unwrap().id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }

    #[test]
    fn test_timestamps_can_be_disabled() {
        let options = StoreOptions {
            timestamps: false,
            ..StoreOptions::default()
        };
        let mut store = TaskStore::open(MemoryStore::new(), options).unwrap();
        let task = store.add_task("x").unwrap();
        assert!(task.created_at.is_none());

        let raw = store.backend().get(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        assert!(!raw.contains("createdAt"));
    }

    #[test]
    fn test_edit_task() {
        let mut store = open_memory();
        let id = store.add_task("Buy milk").unwrap().id;

        let edited = store.edit_task(id, "  Buy oat milk ").unwrap();
        assert_eq!(edited.text, "Buy oat milk");
        assert_eq!(store.get(id).unwrap().text, "Buy oat milk");
    }

    #[test]
    fn test_edit_empty_leaves_task_unchanged() {
        let mut store = open_memory();
        let id = store.add_task("Buy milk").unwrap().id;

        assert!(matches!(store.edit_task(id, "   "), Err(TaskError::EmptyInput)));
        assert_eq!(store.get(id).unwrap().text, "Buy milk");
    }

    #[test]
    fn test_edit_missing_is_not_found() {
        let mut store = open_memory();
        let err = store.edit_task(TaskId(99), "x").unwrap_err();
        assert!(err.is_not_found());
        // Lookup is checked before validation
        assert!(store.edit_task(TaskId(99), "").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_task() {
        let mut store = open_memory();
        let id = store.add_task("a").unwrap().id;
        store.add_task("b").unwrap();

        store.delete_task(id).unwrap();
        assert_eq!(texts(&store), vec!["b"]);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut store = open_memory();
        store.add_task("a").unwrap();

        assert!(matches!(store.delete_task(TaskId(1)), Err(TaskError::NotFound(TaskId(1)))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_double_toggle_restores_state() {
        let mut store = open_memory();
        let id = store.add_task("a").unwrap().id;

        assert!(store.toggle_task(id).unwrap().completed);
        assert!(!store.toggle_task(id).unwrap().completed);
        assert!(!store.get(id).unwrap().completed);
        assert!(store.toggle_task(TaskId(1)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_filters_partition_collection() {
        let mut store = open_memory();
        for i in 0..6 {
            let id = store.add_task(&format!("t{}", i)).unwrap().id;
            if i % 2 == 0 {
                store.toggle_task(id).unwrap();
            }
        }

        store.set_filter(Filter::All);
        let all: Vec<TaskId> = store.filtered_tasks().iter().map(|t| t.id).collect();
        store.set_filter(Filter::Completed);
        let completed: Vec<TaskId> = store.filtered_tasks().iter().map(|t| t.id).collect();
        store.set_filter(Filter::Pending);
        let pending: Vec<TaskId> = store.filtered_tasks().iter().map(|t| t.id).collect();

        assert_eq!(completed.len(), 3);
        assert_eq!(pending.len(), 3);
        assert!(completed.iter().all(|id| !pending.contains(id)));

        // Order within each subset follows the collection
        let merged: Vec<TaskId> = all.iter().copied().filter(|id| completed.contains(id) || pending.contains(id)).collect();
        assert_eq!(merged, all);
        let completed_in_order: Vec<TaskId> = all.iter().copied().filter(|id| completed.contains(id)).collect();
        assert_eq!(completed_in_order, completed);
    }

    #[test]
    fn test_filter_is_not_persisted() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = TaskStore::open(FileStore::open(temp.path()).unwrap(), StoreOptions::default()).unwrap();
            store.add_task("a").unwrap();
            store.set_filter(Filter::Completed);
            assert!(store.filtered_tasks().is_empty());
        }
        let store = TaskStore::open(FileStore::open(temp.path()).unwrap(), StoreOptions::default()).unwrap();
        assert_eq!(store.filter(), Filter::All);
        assert_eq!(store.filtered_tasks().len(), 1);
    }

    #[test]
    fn test_clear_completed_nothing_to_clear() {
        let mut store = open_memory();
        store.add_task("a").unwrap();
        assert!(matches!(store.clear_completed(), Err(TaskError::NothingToClear)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_completed_three_of_five() {
        let mut store = open_memory();
        for i in 0..5 {
            let id = store.add_task(&format!("t{}", i)).unwrap().id;
            if i < 3 {
                store.toggle_task(id).unwrap();
            }
        }

        assert_eq!(store.clear_completed().unwrap(), 3);
        assert_eq!(store.len(), 2);
        assert!(store.tasks().iter().all(|t| !t.completed));
    }

    #[test]
    fn test_stats() {
        let mut store = open_memory();
        assert_eq!(store.stats(), Stats::default());

        let id = store.add_task("a").unwrap().id;
        store.add_task("b").unwrap();
        store.toggle_task(id).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending(), 1);
    }

    #[test]
    fn test_reopen_reproduces_collection() {
        let temp = TempDir::new().unwrap();
        let saved = {
            let mut store = TaskStore::open(FileStore::open(temp.path()).unwrap(), StoreOptions::default()).unwrap();
            store.add_task("Buy milk").unwrap();
            let id = store.add_task("Walk dog").unwrap().id;
            store.toggle_task(id).unwrap();
            store.tasks().clone()
        };

        let store = TaskStore::open(FileStore::open(temp.path()).unwrap(), StoreOptions::default()).unwrap();
        assert_eq!(store.tasks(), &saved);
        assert!(store.last_load_error().is_none());
    }

    #[test]
    fn test_save_rewrites_backend() {
        let mut store = open_memory();
        store.add_task("a").unwrap();
        store.backend.remove(DEFAULT_STORAGE_KEY).unwrap();

        store.save().unwrap();
        let raw = store.backend().get(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        assert_eq!(TaskCollection::from_json(&raw).unwrap(), *store.tasks());
    }

    #[test]
    fn test_load_absent_is_empty() {
        let store = open_memory();
        assert!(store.is_empty());
        assert!(store.last_load_error().is_none());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let mut backend = MemoryStore::new();
        backend.set(DEFAULT_STORAGE_KEY, "{not json").unwrap();

        let mut store = TaskStore::open(backend, StoreOptions::default()).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.last_load_error(), Some(StorageError::Corrupt { .. })));

        // The store stays usable and the next save replaces the bad data
        store.add_task("fresh").unwrap();
        let store = TaskStore::open(store.into_backend(), StoreOptions::default()).unwrap();
        assert_eq!(texts(&store), vec!["fresh"]);
        assert!(store.last_load_error().is_none());
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let mut store = TaskStore::open(FlakyStore::default(), StoreOptions::default()).unwrap();
        let id = store.add_task("a").unwrap().id;
        store.backend.fail_writes = true;

        assert!(matches!(store.add_task("b"), Err(TaskError::Storage(_))));
        assert!(matches!(store.toggle_task(id), Err(TaskError::Storage(_))));
        assert!(matches!(store.delete_task(id), Err(TaskError::Storage(_))));
        assert!(matches!(store.edit_task(id, "z"), Err(TaskError::Storage(_))));

        assert_eq!(texts(&store), vec!["a"]);
        assert!(!store.get(id).unwrap().completed);
    }

    #[test]
    fn test_failed_clear_is_silent_and_keeps_tasks() {
        let seen: Rc<RefCell<Vec<Change>>> = Rc::default();
        let mut store = TaskStore::open(FlakyStore::default(), StoreOptions::default()).unwrap();
        let id = store.add_task("a").unwrap().id;
        store.add_task("b").unwrap();
        store.toggle_task(id).unwrap();

        let sink = Rc::clone(&seen);
        store.subscribe(move |change| sink.borrow_mut().push(change.clone()));
        store.backend.fail_writes = true;

        assert!(matches!(store.clear_completed(), Err(TaskError::Storage(_))));
        assert!(matches!(store.add_task("c"), Err(TaskError::Storage(_))));
        assert_eq!(store.completed_count(), 1);
        assert_eq!(store.len(), 2);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_open_fails_when_backend_unreadable() {
        let mut backend = FlakyStore::default();
        backend.inner.set(DEFAULT_STORAGE_KEY, r#"[{"id":1,"text":"a","completed":false}]"#).unwrap();
        backend.fail_reads = true;

        let err = TaskStore::open(backend, StoreOptions::default()).err().unwrap();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn test_failed_reload_keeps_stored_tasks() {
        let mut store = TaskStore::open(FlakyStore::default(), StoreOptions::default()).unwrap();
        store.add_task("a").unwrap();
        store.add_task("b").unwrap();

        store.backend.fail_reads = true;
        assert!(matches!(store.load(), Err(StorageError::Io(_))));
        assert_eq!(texts(&store), vec!["b", "a"]);
        assert!(store.last_load_error().is_none());

        // A later write still carries the tasks that were stored before
        store.backend.fail_reads = false;
        store.add_task("new").unwrap();
        let raw = store.backend().get(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        let persisted = TaskCollection::from_json(&raw).unwrap();
        let persisted: Vec<&str> = persisted.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(persisted, vec!["new", "b", "a"]);
    }

    #[test]
    fn test_add_after_max_id_does_not_overflow() {
        let mut backend = MemoryStore::new();
        backend
            .set(DEFAULT_STORAGE_KEY, &format!(r#"[{{"id":{},"text":"x","completed":false}}]"#, i64::MAX))
            .unwrap();
        let mut store = TaskStore::open(backend, StoreOptions::default()).unwrap();

        let first = store.add_task("y").unwrap();
        let second = store.add_task("z").unwrap();
        assert_ne!(first.id, TaskId(i64::MAX));
        assert_ne!(first.id, second.id);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_pending_never_underflows() {
        let stats = Stats { total: 1, completed: 2 };
        assert_eq!(stats.pending(), 0);
    }

    #[test]
    fn test_observers_see_changes() {
        let seen: Rc<RefCell<Vec<Change>>> = Rc::default();
        let mut store = open_memory();
        let sink = Rc::clone(&seen);
        store.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        let task = store.add_task("a").unwrap();
        store.toggle_task(task.id).unwrap();
        store.set_filter(Filter::Pending);
        store.clear_completed().unwrap();
        let _ = store.delete_task(task.id);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], Change::Added(task.clone()));
        assert!(matches!(&seen[1], Change::Toggled(t) if t.completed));
        assert_eq!(seen[2], Change::FilterChanged(Filter::Pending));
        assert_eq!(seen[3], Change::Cleared(1));
    }
}
