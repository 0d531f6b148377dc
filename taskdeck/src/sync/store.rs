//! Canonical query state and the store that owns it.
//!
//! [`TaskStore`] wraps a [`tokio::sync::watch`] channel: readers take
//! snapshots or subscribe for change notifications, and writers go through
//! [`TaskStore::modify`], which runs under the channel's write lock so a
//! read-modify-write is never interleaved with another writer.

use tokio::sync::watch;

use taskdeck_proto::task::Task;

use crate::repository::RepositoryError;

/// Client-side view of the remote task collection plus fetch status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    /// Materialized collection; `None` until the first successful fetch
    /// or optimistic write.
    pub tasks: Option<Vec<Task>>,
    /// A fetch is in flight (first load or background refresh).
    pub is_fetching: bool,
    /// Error of the most recent fetch, cleared by the next success.
    pub error: Option<RepositoryError>,
    /// Mutations that have applied their optimistic write but not settled.
    pub mutations_in_flight: usize,
    /// Bumped whenever a fetch starts or is superseded; a fetch only
    /// writes its result if the epoch is unchanged.
    pub(crate) fetch_epoch: u64,
    /// At least one fetch has been started.
    pub(crate) fetch_started: bool,
}

impl QueryState {
    /// The collection, or an empty slice when nothing is loaded yet.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        self.tasks.as_deref().unwrap_or_default()
    }

    /// No data yet and the first fetch is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.tasks.is_none() && self.is_fetching
    }

    /// Any fetch is in flight, including background refreshes.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.is_fetching
    }

    /// The last fetch failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Single owner of the [`QueryState`].
#[derive(Debug)]
pub struct TaskStore {
    tx: watch::Sender<QueryState>,
}

impl TaskStore {
    /// Creates a store with nothing loaded.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(QueryState::default());
        Self { tx }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn get(&self) -> QueryState {
        self.tx.borrow().clone()
    }

    /// Atomically applies `f` to the state and notifies subscribers.
    pub fn modify<T>(&self, f: impl FnOnce(&mut QueryState) -> T) -> T {
        let mut out = None;
        self.tx.send_modify(|state| out = Some(f(state)));
        // send_modify always invokes the closure exactly once.
        match out {
            Some(value) => value,
            None => unreachable!("send_modify did not run the closure"),
        }
    }

    /// Receiver that observes every subsequent change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.tx.subscribe()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
