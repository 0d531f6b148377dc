//! Repository layer: access to the remote task collection.
//!
//! Defines the [`TaskRepository`] trait that the cache synchronizer talks to.
//! Concrete implementations:
//! - [`http::HttpRepository`]: JSON over HTTP against `/api/tasks`
//! - [`memory::InMemoryRepository`]: in-process backend for tests and offline use

pub mod http;
pub mod memory;

use std::fmt;

use taskdeck_proto::task::{NewTask, Task, TaskId};

/// Which repository call an error or injected failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET /api/tasks`
    FetchAll,
    /// `POST /api/tasks`
    Create,
    /// `DELETE /api/tasks/{id}`
    Delete,
    /// `PUT /api/tasks/{id}`
    SetStatus,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchAll => write!(f, "fetch"),
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
            Self::SetStatus => write!(f, "set-status"),
        }
    }
}

/// Errors surfaced by a [`TaskRepository`].
///
/// Every variant is a transport failure from the cache's point of view.
/// `Clone` so the last fetch error can live in shared query state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The referenced task does not exist on the server.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The server answered with a non-success status.
    #[error("server returned {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Message from the response body, or the status reason.
        message: String,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The client could not be set up (bad base URL, TLS init failure).
    #[error("client setup failed: {0}")]
    Client(String),

    /// A failure injected by a test backend.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl RepositoryError {
    /// Whether this error means the referenced task does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<taskdeck_proto::codec::CodecError> for RepositoryError {
    fn from(e: taskdeck_proto::codec::CodecError) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Async access to the remote task collection.
///
/// Implementations perform exactly one request per call and never retry.
pub trait TaskRepository: Send + Sync {
    /// Fetches the whole collection in server order.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Task>, RepositoryError>> + Send;

    /// Creates a task; the server assigns the authoritative id.
    fn create_one(
        &self,
        new_task: &NewTask,
    ) -> impl Future<Output = Result<Task, RepositoryError>> + Send;

    /// Deletes a task, returning the server's confirmation message.
    ///
    /// Fails with [`RepositoryError::NotFound`] for unknown ids.
    fn delete_one(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<String, RepositoryError>> + Send;

    /// Sets the `completed` flag of a task and returns the updated record.
    ///
    /// Fails with [`RepositoryError::NotFound`] for unknown ids.
    fn set_status(
        &self,
        id: TaskId,
        completed: bool,
    ) -> impl Future<Output = Result<Task, RepositoryError>> + Send;
}
