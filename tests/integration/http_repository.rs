//! Integration tests for `HttpRepository`.
//!
//! Each test starts an in-process axum server on `127.0.0.1:0` that speaks
//! the task API and can be switched into failure modes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use parking_lot::Mutex;
use url::Url;

use taskdeck::repository::http::HttpRepository;
use taskdeck::repository::{RepositoryError, TaskRepository};
use taskdeck::sync::{MutationOutcome, TaskCache};
use taskdeck_proto::task::{MessageResponse, NewTask, StatusUpdate, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Broken,
    Garbage,
    Slow,
}

struct ServerState {
    tasks: Mutex<Vec<Task>>,
    next_id: AtomicU64,
    mode: Mutex<Mode>,
}

type Shared = Arc<ServerState>;

fn not_found() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(MessageResponse {
            message: "Task not found".to_string(),
        }),
    )
}

async fn list_tasks(State(state): State<Shared>) -> Response {
    let mode = *state.mode.lock();
    match mode {
        Mode::Normal => Json(state.tasks.lock().clone()).into_response(),
        Mode::Broken => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(MessageResponse {
                message: "database unavailable".to_string(),
            }),
        )
            .into_response(),
        Mode::Garbage => (StatusCode::OK, r#"[{"id": "oops""#).into_response(),
        Mode::Slow => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(state.tasks.lock().clone()).into_response()
        }
    }
}

async fn create_task(
    State(state): State<Shared>,
    Json(new_task): Json<NewTask>,
) -> (StatusCode, Json<Task>) {
    let id = TaskId::new(state.next_id.fetch_add(1, Ordering::Relaxed));
    let task = new_task.into_task(id);
    state.tasks.lock().insert(0, task.clone());
    (StatusCode::CREATED, Json(task))
}

async fn update_task(
    State(state): State<Shared>,
    Path(id): Path<u64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Task>, (StatusCode, Json<MessageResponse>)> {
    let mut tasks = state.tasks.lock();
    let task = tasks
        .iter_mut()
        .find(|t| t.id.get() == id)
        .ok_or_else(not_found)?;
    task.completed = update.completed;
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(state): State<Shared>,
    Path(id): Path<u64>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<MessageResponse>)> {
    let mut tasks = state.tasks.lock();
    let pos = tasks
        .iter()
        .position(|t| t.id.get() == id)
        .ok_or_else(not_found)?;
    tasks.remove(pos);
    Ok(Json(MessageResponse {
        message: format!("Task with id {id} deleted successfully"),
    }))
}

/// Starts the task API on an OS-assigned port.
async fn start_server() -> (SocketAddr, Shared) {
    let state = Arc::new(ServerState {
        tasks: Mutex::new(vec![
            Task::new(TaskId::new(1), "Task 1", "Description 1"),
            Task::new(TaskId::new(2), "Task 2", "Description 2").with_completed(true),
        ]),
        next_id: AtomicU64::new(100),
        mode: Mutex::new(Mode::Normal),
    });

    let app = axum::Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", put(update_task).delete(delete_task))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn repository(addr: SocketAddr, timeout: Duration) -> HttpRepository {
    let base = Url::parse(&format!("http://{addr}")).unwrap();
    HttpRepository::new(&base, timeout).unwrap()
}

#[tokio::test]
async fn fetch_all_decodes_collection() {
    let (addr, _state) = start_server().await;
    let repo = repository(addr, Duration::from_secs(5));

    let tasks = repo.fetch_all().await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "Task 1");
    assert!(tasks[1].completed);
}

#[tokio::test]
async fn create_returns_server_record() {
    let (addr, state) = start_server().await;
    let repo = repository(addr, Duration::from_secs(5));

    let created = repo
        .create_one(&NewTask::new("X", "Y").unwrap())
        .await
        .unwrap();
    assert_eq!(created.id, TaskId::new(100));
    assert_eq!(created.title, "X");
    assert!(!created.completed);
    assert_eq!(state.tasks.lock()[0], created);
}

#[tokio::test]
async fn set_status_and_not_found() {
    let (addr, _state) = start_server().await;
    let repo = repository(addr, Duration::from_secs(5));

    let updated = repo.set_status(TaskId::new(1), true).await.unwrap();
    assert!(updated.completed);
    assert_eq!(updated.id, TaskId::new(1));

    let err = repo.set_status(TaskId::new(9), true).await.unwrap_err();
    assert_eq!(err, RepositoryError::NotFound(TaskId::new(9)));
}

#[tokio::test]
async fn delete_returns_message_then_not_found() {
    let (addr, state) = start_server().await;
    let repo = repository(addr, Duration::from_secs(5));

    let message = repo.delete_one(TaskId::new(2)).await.unwrap();
    assert_eq!(message, "Task with id 2 deleted successfully");
    assert_eq!(state.tasks.lock().len(), 1);

    let err = repo.delete_one(TaskId::new(2)).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn server_error_carries_message() {
    let (addr, state) = start_server().await;
    let repo = repository(addr, Duration::from_secs(5));
    *state.mode.lock() = Mode::Broken;

    let err = repo.fetch_all().await.unwrap_err();
    assert_eq!(
        err,
        RepositoryError::Status {
            code: 500,
            message: "database unavailable".to_string(),
        }
    );
    assert_eq!(err.to_string(), "server returned 500: database unavailable");
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let (addr, state) = start_server().await;
    let repo = repository(addr, Duration::from_secs(5));
    *state.mode.lock() = Mode::Garbage;

    let err = repo.fetch_all().await.unwrap_err();
    assert!(matches!(err, RepositoryError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn slow_server_times_out() {
    let (addr, state) = start_server().await;
    let repo = repository(addr, Duration::from_millis(100));
    *state.mode.lock() = Mode::Slow;

    let err = repo.fetch_all().await.unwrap_err();
    assert_eq!(err, RepositoryError::Timeout);
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let repo = repository(addr, Duration::from_secs(5));
    let err = repo.fetch_all().await.unwrap_err();
    assert!(matches!(err, RepositoryError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn cache_over_http_converges_to_server() {
    let (addr, state) = start_server().await;
    let (cache, mut events) = TaskCache::new(repository(addr, Duration::from_secs(5)), 8);
    cache.refetch().await;
    assert_eq!(cache.snapshot().tasks().len(), 2);

    assert_eq!(
        cache.create("Buy milk", "Two litres").await,
        MutationOutcome::Applied
    );
    assert_eq!(
        cache.set_status(TaskId::new(1), true).await,
        MutationOutcome::Applied
    );
    assert_eq!(
        cache.remove(TaskId::new(42)).await,
        MutationOutcome::RolledBack
    );

    let server = state.tasks.lock().clone();
    assert_eq!(cache.snapshot().tasks(), server.as_slice());
    assert_eq!(cache.snapshot().tasks()[0].title, "Buy milk");

    let event = events.try_recv().unwrap();
    assert_eq!(event.message(), "Failed to delete task: task 42 not found");
    assert!(events.try_recv().is_err());
}
