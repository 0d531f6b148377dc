//! Approximate string matching for task search.
//!
//! Scores are on a `0.0` (exact) to `1.0` (no match) scale. A score is the
//! edit distance of the best-matching substring divided by the pattern
//! length, plus a proximity penalty of `match_start / distance`, clamped
//! to `1.0`. Matching is case-insensitive and works on Unicode scalar
//! values.

/// Default acceptance threshold: loose matching.
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// Default proximity distance: a match starting this many characters into
/// the text costs a full point.
pub const DEFAULT_DISTANCE: usize = 100;

/// Threshold-based fuzzy matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatcher {
    /// Highest score still counted as a match.
    pub threshold: f64,
    /// Proximity scale; `0` makes any non-leading match a miss.
    pub distance: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            distance: DEFAULT_DISTANCE,
        }
    }
}

/// One DP cell: errors so far and where the aligned substring starts.
#[derive(Debug, Clone, Copy)]
struct Cell {
    errors: usize,
    start: usize,
}

impl FuzzyMatcher {
    /// Creates a matcher with explicit settings.
    #[must_use]
    pub const fn new(threshold: f64, distance: usize) -> Self {
        Self {
            threshold,
            distance,
        }
    }

    /// Score of the best approximate occurrence of `pattern` in `text`.
    ///
    /// An empty pattern scores `0.0` against anything.
    #[must_use]
    pub fn score(&self, pattern: &str, text: &str) -> f64 {
        let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
        if pattern.is_empty() {
            return 0.0;
        }
        let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

        // Sellers' algorithm: row i holds the cheapest alignment of
        // pattern[..i] against a substring of text ending at column j.
        let mut prev: Vec<Cell> = (0..=text.len())
            .map(|j| Cell {
                errors: 0,
                start: j,
            })
            .collect();
        let mut row = prev.clone();
        for (i, &pc) in pattern.iter().enumerate() {
            row[0] = Cell {
                errors: i + 1,
                start: 0,
            };
            for (j, &tc) in text.iter().enumerate() {
                let diag = Cell {
                    errors: prev[j].errors + usize::from(pc != tc),
                    start: prev[j].start,
                };
                let up = Cell {
                    errors: prev[j + 1].errors + 1,
                    start: prev[j + 1].start,
                };
                let left = Cell {
                    errors: row[j].errors + 1,
                    start: row[j].start,
                };
                row[j + 1] = [up, left]
                    .into_iter()
                    .fold(diag, |best, c| if c.errors < best.errors { c } else { best });
            }
            std::mem::swap(&mut prev, &mut row);
        }

        prev.iter()
            .map(|cell| self.combine(cell.errors, cell.start, pattern.len()))
            .fold(1.0_f64, f64::min)
    }

    /// Score of `pattern` against `text` if it is within the threshold.
    #[must_use]
    pub fn matches(&self, pattern: &str, text: &str) -> Option<f64> {
        let score = self.score(pattern, text);
        (score <= self.threshold).then_some(score)
    }

    #[allow(clippy::cast_precision_loss)]
    fn combine(&self, errors: usize, start: usize, pattern_len: usize) -> f64 {
        let accuracy = errors as f64 / pattern_len as f64;
        let proximity = if self.distance == 0 {
            if start == 0 { 0.0 } else { 1.0 }
        } else {
            start as f64 / self.distance as f64
        };
        (accuracy + proximity).min(1.0)
    }
}
