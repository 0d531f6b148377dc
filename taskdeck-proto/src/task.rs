//! Task record and request/response payloads for the task API.
//!
//! The wire shape of a task is `{ id, title, description, completed }`.
//! Creation sends `{ title, description }` and a status change sends
//! `{ completed }`. Deletion answers with `{ message }`.

use serde::{Deserialize, Serialize};

/// Identifier of a task.
///
/// Assigned by the server for persisted tasks and by the client for
/// optimistic placeholders. Serialized as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Wraps a raw integer id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A task as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within the collection.
    pub id: TaskId,
    /// Short title shown in lists.
    pub title: String,
    /// Longer free-form description.
    pub description: String,
    /// Whether the task is done.
    pub completed: bool,
}

impl Task {
    /// Creates an open (not completed) task.
    pub fn new(id: TaskId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            completed: false,
        }
    }

    /// Returns this task with the `completed` flag set to `completed`.
    #[must_use]
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }
}

/// Reasons a creation request is rejected before it reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Title is empty or whitespace only.
    #[error("task title cannot be blank")]
    TitleEmpty,
    /// Description is empty or whitespace only.
    #[error("task description cannot be blank")]
    DescriptionEmpty,
}

/// Creation payload: `{ title, description }`.
///
/// Only obtainable through [`NewTask::new`] (deserialization goes through
/// it too), so holding one means both fields contain something other than
/// whitespace. The text itself is kept as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNewTask")]
pub struct NewTask {
    title: String,
    description: String,
}

#[derive(Deserialize)]
struct RawNewTask {
    title: String,
    description: String,
}

impl TryFrom<RawNewTask> for NewTask {
    type Error = ValidationError;

    fn try_from(raw: RawNewTask) -> Result<Self, Self::Error> {
        Self::new(raw.title, raw.description)
    }
}

impl NewTask {
    /// Validates and builds a creation payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TitleEmpty`] or
    /// [`ValidationError::DescriptionEmpty`] when the corresponding field
    /// is blank after trimming.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        let description = description.into();
        if title.trim().is_empty() {
            return Err(ValidationError::TitleEmpty);
        }
        if description.trim().is_empty() {
            return Err(ValidationError::DescriptionEmpty);
        }
        Ok(Self { title, description })
    }

    /// The title as typed.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The description as typed.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Turns the payload into an open task carrying `id`.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task::new(id, self.title, self.description)
    }
}

/// Status change payload: `{ completed }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// New value of the task's `completed` flag.
    pub completed: bool,
}

/// Body returned by a successful delete, and by the server on errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}
