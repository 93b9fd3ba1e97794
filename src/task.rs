// Task and TaskCollection: the persisted data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Identifier of a task, unique within a collection
///
/// Numeric so that collections written by the browser widget, which used
/// `Date.now()` as the id, load unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TaskId)
    }
}

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

/// Ordered list of tasks, newest first
///
/// This is the unit of persistence: it is always written and read whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskCollection {
    tasks: Vec<Task>,
}

impl TaskCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, dropping later entries whose id was already seen
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut seen = HashSet::with_capacity(tasks.len());
        let mut kept = Vec::with_capacity(tasks.len());
        for task in tasks {
            if seen.insert(task.id) {
                kept.push(task);
            } else {
                warn!(id = %task.id, "Duplicate task id in collection, keeping first occurrence");
            }
        }
        Self { tasks: kept }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let tasks: Vec<Task> = serde_json::from_str(json)?;
        Ok(Self::from_tasks(tasks))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.tasks)
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn prepend(&mut self, task: Task) {
        self.tasks.insert(0, task);
    }

    /// Remove the task with `id`, returning it if present
    pub(crate) fn remove(&mut self, id: TaskId) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(pos))
    }

    /// Drop every completed task, returning how many were removed
    pub(crate) fn remove_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        before - self.tasks.len()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    /// Next free id: `now_ms`, or one past the largest id when that is taken
    /// or the clock is behind existing ids
    ///
    /// When the largest id is `i64::MAX` the first free value at or after
    /// `now_ms` is used, then the first free value below it. `None` only if
    /// every id is taken.
    pub fn next_id(&self, now_ms: i64) -> Option<TaskId> {
        let max = match self.tasks.iter().map(|t| t.id.0).max() {
            Some(max) if max >= now_ms => max,
            _ => return Some(TaskId(now_ms)),
        };
        if let Some(next) = max.checked_add(1) {
            return Some(TaskId(next));
        }

        let taken: HashSet<i64> = self.tasks.iter().map(|t| t.id.0).collect();
        (now_ms..=i64::MAX)
            .chain((i64::MIN..now_ms).rev())
            .find(|id| !taken.contains(id))
            .map(TaskId)
    }
}

impl<'a> IntoIterator for &'a TaskCollection {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
