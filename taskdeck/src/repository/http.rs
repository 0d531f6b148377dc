//! HTTP implementation of [`TaskRepository`].
//!
//! Talks JSON to `<base>/api/tasks`:
//!
//! | call         | request                      | success body         |
//! |--------------|------------------------------|----------------------|
//! | `fetch_all`  | `GET /api/tasks`             | `Task[]`             |
//! | `create_one` | `POST /api/tasks`            | `Task` (201)         |
//! | `delete_one` | `DELETE /api/tasks/{id}`     | `{ message }`        |
//! | `set_status` | `PUT /api/tasks/{id}`        | `Task`               |
//!
//! A `404` on an id-addressed call maps to [`RepositoryError::NotFound`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

use taskdeck_proto::codec;
use taskdeck_proto::task::{MessageResponse, NewTask, StatusUpdate, Task, TaskId};

use super::{RepositoryError, TaskRepository};

/// Task repository backed by a remote HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: Client,
    /// `<base>/api/tasks`
    tasks_url: Url,
}

impl HttpRepository {
    /// Creates a repository for the API rooted at `base_url`.
    ///
    /// Every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Client`] if `base_url` cannot carry a
    /// path or the HTTP client cannot be built.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, RepositoryError> {
        let mut tasks_url = base_url.clone();
        tasks_url
            .path_segments_mut()
            .map_err(|()| RepositoryError::Client(format!("{base_url} cannot be a base URL")))?
            .pop_if_empty()
            .extend(["api", "tasks"]);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RepositoryError::Client(e.to_string()))?;

        Ok(Self { client, tasks_url })
    }

    /// The collection endpoint this repository talks to.
    #[must_use]
    pub const fn tasks_url(&self) -> &Url {
        &self.tasks_url
    }

    fn item_url(&self, id: TaskId) -> Url {
        let mut url = self.tasks_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&id.to_string());
        }
        url
    }

    /// Sends `request` and returns the body of a successful response.
    ///
    /// `id` is the task the request addresses, if any; it turns a `404`
    /// into [`RepositoryError::NotFound`].
    async fn send(
        &self,
        request: RequestBuilder,
        id: Option<TaskId>,
    ) -> Result<Vec<u8>, RepositoryError> {
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport)?;

        if status == StatusCode::NOT_FOUND
            && let Some(id) = id
        {
            return Err(RepositoryError::NotFound(id));
        }
        if !status.is_success() {
            let message = codec::error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string()
            });
            return Err(RepositoryError::Status {
                code: status.as_u16(),
                message,
            });
        }
        Ok(body.to_vec())
    }
}

/// Maps a `reqwest` failure to the repository taxonomy.
fn map_transport(e: reqwest::Error) -> RepositoryError {
    if e.is_timeout() {
        RepositoryError::Timeout
    } else if e.is_decode() {
        RepositoryError::Decode(e.to_string())
    } else {
        RepositoryError::Network(e.to_string())
    }
}

impl TaskRepository for HttpRepository {
    async fn fetch_all(&self) -> Result<Vec<Task>, RepositoryError> {
        tracing::debug!(url = %self.tasks_url, "GET tasks");
        let body = self
            .send(self.client.get(self.tasks_url.clone()), None)
            .await?;
        Ok(codec::decode_tasks(&body)?)
    }

    async fn create_one(&self, new_task: &NewTask) -> Result<Task, RepositoryError> {
        tracing::debug!(url = %self.tasks_url, "POST task");
        let body = self
            .send(self.client.post(self.tasks_url.clone()).json(new_task), None)
            .await?;
        Ok(codec::decode(&body)?)
    }

    async fn delete_one(&self, id: TaskId) -> Result<String, RepositoryError> {
        tracing::debug!(task_id = %id, "DELETE task");
        let body = self
            .send(self.client.delete(self.item_url(id)), Some(id))
            .await?;
        let response: MessageResponse = codec::decode(&body)?;
        Ok(response.message)
    }

    async fn set_status(&self, id: TaskId, completed: bool) -> Result<Task, RepositoryError> {
        tracing::debug!(task_id = %id, completed, "PUT task status");
        let request = self
            .client
            .put(self.item_url(id))
            .json(&StatusUpdate { completed });
        let body = self.send(request, Some(id)).await?;
        Ok(codec::decode(&body)?)
    }
}
