//! Line-range arguments shared by range-style delayables.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Lines `start..end` still to be processed. `end: None` runs to the end of
/// the document, whatever its length is by the time the step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeArgs {
    pub start: usize,
    pub end: Option<usize>,
}

impl RangeArgs {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// From `start` to the end of the document.
    pub fn to_end(start: usize) -> Self {
        Self { start, end: None }
    }

    /// The whole document.
    pub fn all() -> Self {
        Self::to_end(0)
    }

    /// Union of two requests: the lower start, the higher end, with an
    /// unbounded end winning.
    pub fn merge(self, other: Self) -> Self {
        let end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        Self {
            start: self.start.min(other.start),
            end,
        }
    }

    /// Concrete lines for a document of `line_count` lines.
    pub fn resolve(&self, line_count: usize) -> Range<usize> {
        let end = self.end.map_or(line_count, |end| end.min(line_count));
        self.start.min(end)..end
    }
}

impl From<Range<usize>> for RangeArgs {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_takes_min_start_and_max_end() {
        let merged = RangeArgs::new(0, 100).merge(RangeArgs::new(50, 300));
        assert_eq!(merged, RangeArgs::new(0, 300));
    }

    #[test]
    fn unbounded_end_dominates() {
        assert_eq!(
            RangeArgs::new(10, 20).merge(RangeArgs::to_end(15)),
            RangeArgs::to_end(10)
        );
        assert_eq!(
            RangeArgs::to_end(5).merge(RangeArgs::new(0, 3)),
            RangeArgs::to_end(0)
        );
    }

    #[test]
    fn resolve_clamps_to_document() {
        assert_eq!(RangeArgs::new(2, 50).resolve(10), 2..10);
        assert_eq!(RangeArgs::to_end(3).resolve(10), 3..10);
        assert_eq!(RangeArgs::new(12, 20).resolve(10), 10..10);
    }
}
