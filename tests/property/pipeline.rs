//! Property-based tests for the filter/search/sort pipeline.
//!
//! Uses proptest to verify:
//! 1. Every stage only ever narrows or reorders its input.
//! 2. The status filter keeps exactly the matching tasks, in order.
//! 3. Status sort puts open tasks first and is stable.
//! 4. Name sort yields a `locale_cmp`-ordered permutation.
//! 5. The pipeline is deterministic and leaves its input untouched.
//! 6. Fuzzy scores stay within `0.0..=1.0`.

use std::cmp::Ordering;

use proptest::prelude::*;
use taskdeck::filter::{
    FilterConfig, FilterPipeline, FuzzyMatcher, SortBy, StatusFilter, apply, locale_cmp,
};
use taskdeck_proto::codec;
use taskdeck_proto::task::{Task, TaskId};

// --- Strategies ---

/// Strategy for task collections with unique ids.
fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(
        ("[a-zA-Z0-9 ]{0,16}", "[a-z ]{0,24}", any::<bool>()),
        0..24,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .zip(1_u64..)
            .map(|((title, description, completed), id)| {
                Task::new(TaskId::new(id), title, description).with_completed(completed)
            })
            .collect()
    })
}

fn arb_status() -> impl Strategy<Value = StatusFilter> {
    prop_oneof![
        Just(StatusFilter::All),
        Just(StatusFilter::Completed),
        Just(StatusFilter::Active),
    ]
}

fn arb_sort() -> impl Strategy<Value = SortBy> {
    prop_oneof![Just(SortBy::None), Just(SortBy::Name), Just(SortBy::Status)]
}

fn arb_config() -> impl Strategy<Value = FilterConfig> {
    (arb_status(), "[a-zA-Z0-9 ]{0,8}", arb_sort()).prop_map(|(status, query, sort_by)| {
        FilterConfig {
            status,
            search_query: query,
            sort_by,
        }
    })
}

fn ids(tasks: &[Task]) -> Vec<u64> {
    tasks.iter().map(|t| t.id.get()).collect()
}

// --- Property tests ---

proptest! {
    /// The result is always drawn from the input, each task at most once,
    /// and every kept task passes the status filter.
    #[test]
    fn result_is_filtered_subset(tasks in arb_tasks(), config in arb_config()) {
        let result = apply(&tasks, &config);
        prop_assert!(result.len() <= tasks.len());
        let mut seen = ids(&result);
        seen.sort_unstable();
        seen.dedup();
        prop_assert_eq!(seen.len(), result.len());
        for task in &result {
            prop_assert!(tasks.contains(task));
            prop_assert!(config.status.matches(task));
        }
    }

    /// Without search or sort, the status filter keeps order and drops
    /// exactly the non-matching tasks.
    #[test]
    fn status_filter_is_exact(tasks in arb_tasks(), status in arb_status()) {
        let config = FilterConfig::default().with_status(status);
        let expected: Vec<Task> = tasks.iter().filter(|t| status.matches(t)).cloned().collect();
        prop_assert_eq!(apply(&tasks, &config), expected);
    }

    /// Open tasks come first and each group keeps its input order.
    #[test]
    fn status_sort_is_stable_partition(tasks in arb_tasks()) {
        let config = FilterConfig::default().with_sort(SortBy::Status);
        let result = apply(&tasks, &config);

        let open: Vec<u64> = tasks.iter().filter(|t| !t.completed).map(|t| t.id.get()).collect();
        let done: Vec<u64> = tasks.iter().filter(|t| t.completed).map(|t| t.id.get()).collect();
        let expected: Vec<u64> = open.into_iter().chain(done).collect();
        prop_assert_eq!(ids(&result), expected);
    }

    /// Name sort is a permutation ordered by `locale_cmp`.
    #[test]
    fn name_sort_is_ordered_permutation(tasks in arb_tasks()) {
        let config = FilterConfig::default().with_sort(SortBy::Name);
        let result = apply(&tasks, &config);
        prop_assert_eq!(result.len(), tasks.len());
        for pair in result.windows(2) {
            prop_assert_ne!(locale_cmp(&pair[0].title, &pair[1].title), Ordering::Greater);
        }
        let mut got = ids(&result);
        let mut want = ids(&tasks);
        got.sort_unstable();
        want.sort_unstable();
        prop_assert_eq!(got, want);
    }

    /// Searching never returns a task the status filter alone would drop.
    #[test]
    fn search_only_narrows(tasks in arb_tasks(), config in arb_config()) {
        let unsearched = apply(&tasks, &config.clone().with_search(""));
        let searched = apply(&tasks, &config);
        for task in &searched {
            prop_assert!(unsearched.contains(task));
        }
    }

    /// Same input, same output; the input is not modified.
    #[test]
    fn pipeline_is_deterministic(tasks in arb_tasks(), config in arb_config()) {
        let before = tasks.clone();
        let pipeline = FilterPipeline::default();
        let first = pipeline.apply(&tasks, &config);
        let second = pipeline.apply(&tasks, &config);
        prop_assert_eq!(first, second);
        prop_assert_eq!(tasks, before);
    }

    /// `locale_cmp` is antisymmetric and only equal for equal strings.
    #[test]
    fn locale_cmp_is_total(a in "[a-zA-Z ]{0,8}", b in "[a-zA-Z ]{0,8}") {
        prop_assert_eq!(locale_cmp(&a, &b), locale_cmp(&b, &a).reverse());
        prop_assert_eq!(locale_cmp(&a, &b) == Ordering::Equal, a == b);
    }

    /// Scores are bounded and an exact prefix is a perfect match.
    #[test]
    fn fuzzy_score_is_bounded(pattern in "[a-z]{1,10}", text in "[a-z ]{0,40}") {
        let matcher = FuzzyMatcher::default();
        let score = matcher.score(&pattern, &text);
        prop_assert!((0.0..=1.0).contains(&score));

        let prefixed = format!("{pattern}{text}");
        prop_assert!(matcher.score(&pattern, &prefixed).abs() < f64::EPSILON);
    }

    /// Random bytes never cause a panic when decoded as a task list.
    #[test]
    fn random_bytes_decode_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode_tasks(&bytes);
    }
}
