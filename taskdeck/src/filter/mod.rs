//! Filter, search and sort pipeline over a task collection.
//!
//! [`FilterPipeline::apply`] is a pure function of the collection and a
//! [`FilterConfig`]. Stages run in a fixed order:
//!
//! 1. status filter ([`StatusFilter`])
//! 2. fuzzy search over title and description, best match first
//! 3. sort ([`SortBy`]), applied to whatever survived 1 and 2
//!
//! The input is never modified; the result is a new vector.

pub mod fuzzy;
pub mod view;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use taskdeck_proto::task::Task;

pub use fuzzy::FuzzyMatcher;
pub use view::FilteredView;

/// Error for an unrecognised filter or sort keyword.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}` (expected one of: {expected})")]
pub struct ParseFilterError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

/// Which tasks to keep by completion status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Keep every task.
    #[default]
    All,
    /// Keep only completed tasks.
    Completed,
    /// Keep only tasks that are not completed.
    Active,
}

impl StatusFilter {
    /// Whether `task` passes this filter.
    #[must_use]
    pub const fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Completed => task.completed,
            Self::Active => !task.completed,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Completed => write!(f, "completed"),
            Self::Active => write!(f, "active"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "completed" => Ok(Self::Completed),
            "active" => Ok(Self::Active),
            other => Err(ParseFilterError {
                kind: "status filter",
                value: other.to_string(),
                expected: "all, completed, active",
            }),
        }
    }
}

/// Ordering applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Keep the filtered (or search-ranked) order.
    #[default]
    None,
    /// Ascending by title, see [`locale_cmp`].
    Name,
    /// Open tasks before completed ones, otherwise stable.
    Status,
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Name => write!(f, "name"),
            Self::Status => write!(f, "status"),
        }
    }
}

impl FromStr for SortBy {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "name" => Ok(Self::Name),
            "status" => Ok(Self::Status),
            other => Err(ParseFilterError {
                kind: "sort key",
                value: other.to_string(),
                expected: "none, name, status",
            }),
        }
    }
}

/// Everything the pipeline needs besides the tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Status filter.
    pub status: StatusFilter,
    /// Fuzzy search text; blank disables search.
    pub search_query: String,
    /// Final ordering.
    pub sort_by: SortBy,
}

impl FilterConfig {
    /// Returns the config with `status` replaced.
    #[must_use]
    pub const fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    /// Returns the config with the search text replaced.
    #[must_use]
    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search_query = query.into();
        self
    }

    /// Returns the config with `sort_by` replaced.
    #[must_use]
    pub const fn with_sort(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }
}

/// The filter/search/sort pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterPipeline {
    matcher: FuzzyMatcher,
}

impl FilterPipeline {
    /// Pipeline using `matcher` for the search stage.
    #[must_use]
    pub const fn new(matcher: FuzzyMatcher) -> Self {
        Self { matcher }
    }

    /// Derives the visible list from `tasks` under `config`.
    #[must_use]
    pub fn apply(&self, tasks: &[Task], config: &FilterConfig) -> Vec<Task> {
        let by_status = tasks.iter().filter(|t| config.status.matches(t));

        let query = config.search_query.trim();
        let mut result: Vec<Task> = if query.is_empty() {
            by_status.cloned().collect()
        } else {
            let mut ranked: Vec<(f64, &Task)> = by_status
                .filter_map(|t| self.best_score(query, t).map(|score| (score, t)))
                .collect();
            // Stable, so equal scores keep collection order.
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
            ranked.into_iter().map(|(_, t)| t.clone()).collect()
        };

        match config.sort_by {
            SortBy::None => {}
            SortBy::Name => result.sort_by(|a, b| locale_cmp(&a.title, &b.title)),
            SortBy::Status => result.sort_by_key(|t| t.completed),
        }
        result
    }

    /// Best in-threshold score over the searchable fields of `task`.
    fn best_score(&self, query: &str, task: &Task) -> Option<f64> {
        [task.title.as_str(), task.description.as_str()]
            .into_iter()
            .filter_map(|field| self.matcher.matches(query, field))
            .reduce(f64::min)
    }
}

/// Runs the default pipeline.
#[must_use]
pub fn apply(tasks: &[Task], config: &FilterConfig) -> Vec<Task> {
    FilterPipeline::default().apply(tasks, config)
}

/// Title ordering used by [`SortBy::Name`].
///
/// Letters compare case-insensitively first; when two titles differ only
/// in case, the first differing character decides with lowercase before
/// uppercase. So `"apple" < "Banana" < "banana!"` and `"a" < "A"`.
#[must_use]
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded
        .then_with(|| {
            a.chars()
                .zip(b.chars())
                .find(|(x, y)| x != y)
                .map_or(Ordering::Equal, |(x, y)| {
                    x.is_uppercase().cmp(&y.is_uppercase())
                })
        })
        .then_with(|| a.cmp(b))
}
