//! Optimistic mutation bookkeeping.
//!
//! A [`PendingMutation`] is created when a mutation applies its optimistic
//! write and carries the collection as it was just before. It is consumed
//! exactly once: dropped on success, or used to restore the collection on
//! failure.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use taskdeck_proto::task::{Task, TaskId};

/// The three mutations the cache supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Add a task.
    Create,
    /// Remove a task.
    Delete,
    /// Change a task's `completed` flag.
    SetStatus,
}

impl MutationKind {
    /// Prefix of the user-facing failure notification.
    #[must_use]
    pub const fn failure_label(self) -> &'static str {
        match self {
            Self::Create => "Failed to create task",
            Self::Delete => "Failed to delete task",
            Self::SetStatus => "Failed to update task status",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
            Self::SetStatus => write!(f, "set-status"),
        }
    }
}

/// Rollback context of one in-flight mutation.
#[derive(Debug)]
#[must_use = "a pending mutation must be settled"]
pub struct PendingMutation {
    kind: MutationKind,
    previous: Option<Vec<Task>>,
}

impl PendingMutation {
    pub(crate) const fn new(kind: MutationKind, previous: Option<Vec<Task>>) -> Self {
        Self { kind, previous }
    }

    /// Which mutation this context belongs to.
    pub const fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Consumes the context, yielding the snapshot to restore.
    pub(crate) fn into_previous(self) -> Option<Vec<Task>> {
        self.previous
    }
}

/// Optimistic write applied to the collection.
pub(crate) fn prepend(tasks: Option<Vec<Task>>, placeholder: Task) -> Vec<Task> {
    let mut tasks = tasks.unwrap_or_default();
    tasks.insert(0, placeholder);
    tasks
}

/// Optimistic delete: drops every task with `id`.
pub(crate) fn without(tasks: Option<Vec<Task>>, id: TaskId) -> Vec<Task> {
    let mut tasks = tasks.unwrap_or_default();
    tasks.retain(|t| t.id != id);
    tasks
}

/// Optimistic status change: rewrites `completed` on the task with `id`.
pub(crate) fn with_status(tasks: Option<Vec<Task>>, id: TaskId, completed: bool) -> Vec<Task> {
    let mut tasks = tasks.unwrap_or_default();
    for task in tasks.iter_mut().filter(|t| t.id == id) {
        task.completed = completed;
    }
    tasks
}

/// Generator of ids for optimistic placeholders.
///
/// Ids are millisecond timestamps bumped past both the last id handed out
/// and every id in the current collection, so they are strictly increasing
/// and never collide with a visible task.
#[derive(Debug, Default)]
pub struct PlaceholderIds {
    last: AtomicU64,
}

impl PlaceholderIds {
    /// Creates a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Next id, guaranteed greater than every id in `existing`.
    ///
    /// Returns `None` once no such id fits in a `u64`; the generator is
    /// left unchanged.
    pub fn next(&self, existing: &[Task]) -> Option<TaskId> {
        let floor = existing
            .iter()
            .map(|t| t.id.get())
            .max()
            .unwrap_or(0)
            .max(Self::now_ms().saturating_sub(1));
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = current.max(floor).checked_add(1)?;
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(TaskId::new(candidate)),
                Err(actual) => current = actual,
            }
        }
    }

    fn now_ms() -> u64 {
        u64::try_from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
        )
        .unwrap_or(u64::MAX)
    }
}
