//! Derived task list that follows both the cache and the filter settings.

use tokio::sync::watch;

use taskdeck_proto::task::Task;

use crate::sync::QueryState;

use super::{FilterConfig, FilterPipeline};

/// Live result of the pipeline.
///
/// Holds receivers for the cache state and the filter settings and
/// recomputes the visible list whenever either changes.
#[derive(Debug)]
pub struct FilteredView {
    state: watch::Receiver<QueryState>,
    config: watch::Receiver<FilterConfig>,
    pipeline: FilterPipeline,
}

impl FilteredView {
    /// Creates a view over `state` filtered by `config`.
    #[must_use]
    pub const fn new(
        state: watch::Receiver<QueryState>,
        config: watch::Receiver<FilterConfig>,
        pipeline: FilterPipeline,
    ) -> Self {
        Self {
            state,
            config,
            pipeline,
        }
    }

    /// Visible list for the latest state and settings.
    #[must_use]
    pub fn current(&self) -> Vec<Task> {
        let config = self.config.borrow().clone();
        let state = self.state.borrow();
        self.pipeline.apply(state.tasks(), &config)
    }

    /// Waits for either input to change and returns the new list.
    ///
    /// Returns `None` once both senders are gone.
    pub async fn changed(&mut self) -> Option<Vec<Task>> {
        let state_open = tokio::select! {
            r = self.state.changed() => r.is_ok(),
            r = self.config.changed() => {
                if r.is_err() {
                    // Settings are frozen; keep following the cache.
                    self.state.changed().await.ok()?;
                }
                true
            }
        };
        if !state_open {
            // Cache is gone; settings may still change.
            self.config.changed().await.ok()?;
        }
        self.state.mark_unchanged();
        self.config.mark_unchanged();
        Some(self.current())
    }
}
