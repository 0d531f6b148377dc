//! Task cache synchronizer.
//!
//! [`TaskCache`] owns the client-side copy of the remote task collection.
//! Reads go through [`TaskCache::load`] / [`TaskCache::snapshot`] /
//! [`TaskCache::subscribe`]; writes go through the three optimistic
//! mutations [`create`](TaskCache::create), [`remove`](TaskCache::remove)
//! and [`set_status`](TaskCache::set_status).
//!
//! # Mutation protocol
//!
//! ```text
//! call ──► begin (atomic: supersede fetch, snapshot, optimistic write)
//!            │
//!            ▼ (spawned task)
//!          request ──ok──► settle: drop snapshot
//!            │
//!            └──err──► settle: restore snapshot, emit SyncEvent
//!                          │
//!                          ▼
//!                      invalidate (refetch), always
//! ```
//!
//! The optimistic write happens when the method is called and the rest
//! runs as a task on the ambient tokio runtime, so it is visible before any
//! network activity and settles even if the returned [`MutationHandle`] is
//! dropped. Errors never reach the caller; they surface as [`SyncEvent`]s
//! on the channel returned by [`TaskCache::new`] and as the `error` field
//! of [`QueryState`] for fetches.

pub mod mutation;
pub mod store;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use taskdeck_proto::task::{NewTask, Task, TaskId};

use crate::repository::{RepositoryError, TaskRepository};

pub use mutation::{MutationKind, PendingMutation, PlaceholderIds};
pub use store::{QueryState, TaskStore};

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A mutation failed remotely and its optimistic write was rolled back.
    MutationFailed {
        /// Which mutation failed.
        kind: MutationKind,
        /// Why it failed.
        error: RepositoryError,
    },
}

impl SyncEvent {
    /// User-facing notification text.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::MutationFailed { kind, error } => {
                format!("{}: {error}", kind.failure_label())
            }
        }
    }
}

/// How a mutation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server accepted the change.
    Applied,
    /// The server rejected the change and the cache was restored.
    RolledBack,
    /// Nothing was attempted and nothing changed: invalid input, no id
    /// left for a placeholder, or no runtime to run on.
    Skipped,
    /// The mutation task ended without settling (runtime shutdown).
    Aborted,
}

/// Completion of a mutation running in the background.
///
/// The mutation settles whether or not this is awaited; dropping it only
/// discards the outcome.
#[derive(Debug)]
pub struct MutationHandle {
    task: Option<JoinHandle<MutationOutcome>>,
}

impl MutationHandle {
    const fn skipped() -> Self {
        Self { task: None }
    }
}

impl Future for MutationHandle {
    type Output = MutationOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<MutationOutcome> {
        let Some(task) = self.get_mut().task.as_mut() else {
            return Poll::Ready(MutationOutcome::Skipped);
        };
        Pin::new(task).poll(cx).map(|joined| {
            joined.unwrap_or_else(|e| {
                warn!(error = %e, "mutation task did not complete");
                MutationOutcome::Aborted
            })
        })
    }
}

struct Inner<R> {
    repository: R,
    store: TaskStore,
    ids: PlaceholderIds,
    events: mpsc::Sender<SyncEvent>,
}

/// Shared handle to the task cache.
///
/// Cloning is cheap; all clones see the same state.
pub struct TaskCache<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for TaskCache<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: TaskRepository + 'static> TaskCache<R> {
    /// Creates an empty cache over `repository`.
    ///
    /// Returns the cache and the receiver for [`SyncEvent`]s. Events are
    /// dropped (with a warning) when `event_buffer` is exhausted.
    pub fn new(repository: R, event_buffer: usize) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (events, events_rx) = mpsc::channel(event_buffer.max(1));
        let cache = Self {
            inner: Arc::new(Inner {
                repository,
                store: TaskStore::new(),
                ids: PlaceholderIds::new(),
                events,
            }),
        };
        (cache, events_rx)
    }

    /// The repository this cache talks to.
    #[must_use]
    pub fn repository(&self) -> &R {
        &self.inner.repository
    }

    /// Current state without side effects.
    #[must_use]
    pub fn snapshot(&self) -> QueryState {
        self.inner.store.get()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.inner.store.subscribe()
    }

    /// Current state, starting the first fetch if none has run yet.
    ///
    /// The fetch is spawned on the ambient tokio runtime; outside a
    /// runtime nothing is started and a warning is logged.
    pub fn load(&self) -> QueryState {
        if !self.snapshot().fetch_started {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let started = self.inner.store.modify(|state| {
                        (!state.fetch_started).then(|| Self::begin_fetch(state))
                    });
                    if let Some(epoch) = started {
                        let cache = self.clone();
                        handle.spawn(async move {
                            let result = cache.inner.repository.fetch_all().await;
                            cache.finish_fetch(epoch, result);
                        });
                    }
                }
                Err(e) => warn!(error = %e, "cannot start initial fetch outside a runtime"),
            }
        }
        self.snapshot()
    }

    /// Fetches the collection and stores the result.
    ///
    /// A fetch that gets superseded while in flight discards its result.
    pub async fn refetch(&self) {
        let epoch = self.inner.store.modify(Self::begin_fetch);
        let result = self.inner.repository.fetch_all().await;
        self.finish_fetch(epoch, result);
    }

    /// Marks the cached collection stale and refetches it.
    pub async fn invalidate(&self) {
        debug!("invalidating task cache");
        self.refetch().await;
    }

    /// Optimistically adds a task.
    ///
    /// A placeholder with a local id is prepended immediately. Blank
    /// `title` or `description` makes this a no-op that resolves to
    /// [`MutationOutcome::Skipped`] without touching the network.
    pub fn create(&self, title: &str, description: &str) -> MutationHandle {
        let new_task = match NewTask::new(title, description) {
            Ok(new_task) => new_task,
            Err(e) => {
                debug!(error = %e, "not creating task");
                return MutationHandle::skipped();
            }
        };
        let Some(runtime) = Self::runtime(MutationKind::Create) else {
            return MutationHandle::skipped();
        };
        let placeholder = new_task.clone();
        let Some(pending) = self.begin(MutationKind::Create, |tasks| {
            let Some(id) = self.inner.ids.next(tasks.as_deref().unwrap_or_default()) else {
                warn!("no task id left for a placeholder, not creating task");
                return None;
            };
            debug!(task_id = %id, "inserting placeholder task");
            Some(mutation::prepend(tasks, placeholder.into_task(id)))
        }) else {
            return MutationHandle::skipped();
        };
        let inner = Arc::clone(&self.inner);
        self.spawn(&runtime, pending, async move {
            let created = inner.repository.create_one(&new_task).await?;
            debug!(task_id = %created.id, "server created task");
            Ok(())
        })
    }

    /// Optimistically removes the task with `id`.
    pub fn remove(&self, id: TaskId) -> MutationHandle {
        let Some(runtime) = Self::runtime(MutationKind::Delete) else {
            return MutationHandle::skipped();
        };
        let Some(pending) = self.begin(MutationKind::Delete, |tasks| {
            Some(mutation::without(tasks, id))
        }) else {
            return MutationHandle::skipped();
        };
        let inner = Arc::clone(&self.inner);
        self.spawn(&runtime, pending, async move {
            let message = inner.repository.delete_one(id).await?;
            debug!(task_id = %id, %message, "server deleted task");
            Ok(())
        })
    }

    /// Optimistically sets the `completed` flag of the task with `id`.
    pub fn set_status(&self, id: TaskId, completed: bool) -> MutationHandle {
        let Some(runtime) = Self::runtime(MutationKind::SetStatus) else {
            return MutationHandle::skipped();
        };
        let Some(pending) = self.begin(MutationKind::SetStatus, |tasks| {
            Some(mutation::with_status(tasks, id, completed))
        }) else {
            return MutationHandle::skipped();
        };
        let inner = Arc::clone(&self.inner);
        self.spawn(&runtime, pending, async move {
            let updated = inner.repository.set_status(id, completed).await?;
            debug!(task_id = %updated.id, completed = updated.completed, "server updated task");
            Ok(())
        })
    }

    fn runtime(kind: MutationKind) -> Option<Handle> {
        Handle::try_current()
            .inspect_err(|e| warn!(%kind, error = %e, "cannot run mutation outside a runtime"))
            .ok()
    }

    /// Starts a fetch on `state` and returns its epoch.
    fn begin_fetch(state: &mut QueryState) -> u64 {
        state.fetch_epoch += 1;
        state.fetch_started = true;
        state.is_fetching = true;
        state.fetch_epoch
    }

    fn finish_fetch(&self, epoch: u64, result: Result<Vec<Task>, RepositoryError>) {
        self.inner.store.modify(|state| {
            if state.fetch_epoch != epoch {
                debug!(epoch, current = state.fetch_epoch, "discarding superseded fetch");
                return;
            }
            state.is_fetching = false;
            match result {
                Ok(tasks) => {
                    debug!(count = tasks.len(), "fetched tasks");
                    state.tasks = Some(tasks);
                    state.error = None;
                }
                Err(e) => {
                    warn!(error = %e, "failed to fetch tasks");
                    state.error = Some(e);
                }
            }
        });
    }

    /// Supersedes any in-flight fetch, captures the collection and applies
    /// `write`, all under one lock. A `write` returning `None` leaves the
    /// state untouched.
    fn begin(
        &self,
        kind: MutationKind,
        write: impl FnOnce(Option<Vec<Task>>) -> Option<Vec<Task>>,
    ) -> Option<PendingMutation> {
        self.inner.store.modify(|state| {
            let previous = state.tasks.clone();
            let next = write(previous.clone())?;
            if state.is_fetching {
                debug!(%kind, "superseding in-flight fetch");
            }
            state.fetch_epoch += 1;
            state.is_fetching = false;
            state.tasks = Some(next);
            state.mutations_in_flight += 1;
            Some(PendingMutation::new(kind, previous))
        })
    }

    /// Spawns `request`, the settle of `pending` and the invalidation as
    /// one task on `runtime`.
    fn spawn(
        &self,
        runtime: &Handle,
        pending: PendingMutation,
        request: impl Future<Output = Result<(), RepositoryError>> + Send + 'static,
    ) -> MutationHandle {
        let cache = self.clone();
        let task = runtime.spawn(async move {
            let result = request.await;
            let outcome = cache.settle(pending, result);
            cache.invalidate().await;
            outcome
        });
        MutationHandle { task: Some(task) }
    }

    fn settle(
        &self,
        pending: PendingMutation,
        result: Result<(), RepositoryError>,
    ) -> MutationOutcome {
        let kind = pending.kind();
        match result {
            Ok(()) => {
                self.inner.store.modify(|state| {
                    state.mutations_in_flight = state.mutations_in_flight.saturating_sub(1);
                });
                debug!(%kind, "mutation applied");
                MutationOutcome::Applied
            }
            Err(error) => {
                warn!(%kind, error = %error, "mutation failed, rolling back");
                self.inner.store.modify(|state| {
                    if let Some(previous) = pending.into_previous() {
                        state.tasks = Some(previous);
                    }
                    state.mutations_in_flight = state.mutations_in_flight.saturating_sub(1);
                });
                self.notify(SyncEvent::MutationFailed { kind, error });
                MutationOutcome::RolledBack
            }
        }
    }

    fn notify(&self, event: SyncEvent) {
        match self.inner.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(message = %event.message(), "notification buffer full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("no notification listener");
            }
        }
    }
}
