//! In-process task backend.
//!
//! [`InMemoryRepository`] behaves like the development API server: ids are
//! assigned from a monotonic millisecond clock, new tasks are prepended,
//! and unknown ids yield [`RepositoryError::NotFound`]. Tests can inject
//! failures per [`Operation`] and hold responses in flight with
//! [`hold`](InMemoryRepository::hold) / [`release`](InMemoryRepository::release).

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::watch;

use taskdeck_proto::task::{NewTask, Task, TaskId};

use super::{Operation, RepositoryError, TaskRepository};

/// Collection state behind the lock.
struct Backend {
    tasks: Vec<Task>,
    last_id: u64,
}

/// Failure plan consulted at the start of every call.
#[derive(Default)]
struct Faults {
    /// One-shot failures, consumed in order.
    next: Vec<Operation>,
    /// Operations that fail until cleared.
    always: HashSet<Operation>,
}

impl Faults {
    fn take(&mut self, op: Operation) -> bool {
        if self.always.contains(&op) {
            return true;
        }
        if let Some(pos) = self.next.iter().position(|o| *o == op) {
            self.next.remove(pos);
            return true;
        }
        false
    }
}

/// In-memory [`TaskRepository`] with failure injection.
pub struct InMemoryRepository {
    backend: Mutex<Backend>,
    faults: Mutex<Faults>,
    calls: Mutex<HashMap<Operation, usize>>,
    /// `true` while responses are held back.
    held: watch::Sender<bool>,
}

impl InMemoryRepository {
    /// Creates a backend holding `tasks` in the given order.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let last_id = tasks.iter().map(|t| t.id.get()).max().unwrap_or(0);
        let (held, _) = watch::channel(false);
        Self {
            backend: Mutex::new(Backend { tasks, last_id }),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(HashMap::new()),
            held,
        }
    }

    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// Creates a backend with a small demo collection.
    #[must_use]
    pub fn seeded() -> Self {
        Self::with_tasks(vec![
            Task::new(
                TaskId::new(1),
                "Finish the client",
                "Wire every screen to the task API",
            )
            .with_completed(true),
            Task::new(
                TaskId::new(2),
                "Learn the state library",
                "Read the docs and do the exercises",
            ),
            Task::new(
                TaskId::new(3),
                "Write unit tests",
                "Cover at least 80% of the code",
            ),
        ])
    }

    /// Makes the next call of `op` fail once.
    pub fn fail_next(&self, op: Operation) {
        self.faults.lock().next.push(op);
    }

    /// Makes every call of `op` fail (`true`) or succeed again (`false`).
    pub fn set_failing(&self, op: Operation, failing: bool) {
        let mut faults = self.faults.lock();
        if failing {
            faults.always.insert(op);
        } else {
            faults.always.remove(&op);
        }
    }

    /// Holds every response until [`release`](Self::release) is called.
    ///
    /// Fetches read the collection before waiting, so a held fetch returns
    /// the state as it was when the request was made. Mutations wait first
    /// and only then touch the collection.
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    /// Lets held responses complete.
    pub fn release(&self) {
        self.held.send_replace(false);
    }

    /// Number of times `op` has been requested.
    #[must_use]
    pub fn call_count(&self, op: Operation) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Current server-side collection.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.backend.lock().tasks.clone()
    }

    fn record(&self, op: Operation) {
        *self.calls.lock().entry(op).or_insert(0) += 1;
    }

    fn check_fault(&self, op: Operation) -> Result<(), RepositoryError> {
        if self.faults.lock().take(op) {
            tracing::debug!(%op, "injecting repository failure");
            return Err(RepositoryError::Injected(format!("{op} failed")));
        }
        Ok(())
    }

    async fn wait_released(&self) {
        let mut rx = self.held.subscribe();
        let _ = rx.wait_for(|held| !*held).await;
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

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRepository for InMemoryRepository {
    async fn fetch_all(&self) -> Result<Vec<Task>, RepositoryError> {
        self.record(Operation::FetchAll);
        let snapshot = self.backend.lock().tasks.clone();
        self.wait_released().await;
        self.check_fault(Operation::FetchAll)?;
        Ok(snapshot)
    }

    async fn create_one(&self, new_task: &NewTask) -> Result<Task, RepositoryError> {
        self.record(Operation::Create);
        self.wait_released().await;
        self.check_fault(Operation::Create)?;
        let mut backend = self.backend.lock();
        let id = backend
            .last_id
            .checked_add(1)
            .map(|next| Self::now_ms().max(next))
            .ok_or_else(|| RepositoryError::Status {
                code: 500,
                message: "task ids exhausted".to_string(),
            })?;
        backend.last_id = id;
        let task = new_task.clone().into_task(TaskId::new(id));
        backend.tasks.insert(0, task.clone());
        Ok(task)
    }

    async fn delete_one(&self, id: TaskId) -> Result<String, RepositoryError> {
        self.record(Operation::Delete);
        self.wait_released().await;
        self.check_fault(Operation::Delete)?;
        let mut backend = self.backend.lock();
        let pos = backend
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(RepositoryError::NotFound(id))?;
        backend.tasks.remove(pos);
        Ok(format!("Task with id {id} deleted successfully"))
    }

    async fn set_status(&self, id: TaskId, completed: bool) -> Result<Task, RepositoryError> {
        self.record(Operation::SetStatus);
        self.wait_released().await;
        self.check_fault(Operation::SetStatus)?;
        let mut backend = self.backend.lock();
        let task = backend
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(RepositoryError::NotFound(id))?;
        task.completed = completed;
        Ok(task.clone())
    }
}
