//! Text documents.
//!
//! [`TextDocument`] is the task-specific surface the built-in delayables
//! need on top of [`Document`]. [`Buffer`] is an in-memory implementation
//! used by the CLI and by hosts without their own editor widget.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::model::{Document, PendingWork};

/// Kinds of byte-range markers a delayable can put on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Misspelling,
    SmartHighlight,
}

/// Read access to text plus indicator bookkeeping.
pub trait TextDocument: Document {
    fn text(&self) -> &str;

    fn line_count(&self) -> usize;

    /// Byte range of `line`, without its line terminator.
    fn line_range(&self, line: usize) -> Option<Range<usize>>;

    /// Indicators of `kind`, sorted by start.
    fn indicators(&self, kind: Indicator) -> &[Range<usize>];

    fn add_indicator(&mut self, kind: Indicator, range: Range<usize>);

    /// Remove indicators of `kind` overlapping `within`.
    fn clear_indicators(&mut self, kind: Indicator, within: Range<usize>);

    fn clear_all_indicators(&mut self, kind: Indicator);
}

/// In-memory text document.
#[derive(Debug, Default)]
pub struct Buffer {
    name: String,
    text: String,
    line_starts: Vec<usize>,
    visible: bool,
    pending: PendingWork,
    indicators: HashMap<Indicator, Vec<Range<usize>>>,
}

impl Buffer {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut buffer = Self {
            name: name.into(),
            text: text.into(),
            visible: true,
            ..Self::default()
        };
        buffer.index_lines();
        buffer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Line containing byte `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|start| *start <= offset)
            .saturating_sub(1)
    }

    /// The text of `line`, without its terminator.
    pub fn line(&self, line: usize) -> Option<&str> {
        self.line_range(line).map(|range| &self.text[range])
    }

    /// Replace the whole text. Indicators are dropped.
    ///
    /// Returns the lines to re-examine.
    pub fn set_text(&mut self, text: impl Into<String>) -> Range<usize> {
        self.text = text.into();
        self.index_lines();
        self.indicators.clear();
        0..self.line_count()
    }

    /// Replace the bytes in `range` with `replacement`.
    ///
    /// Indicators overlapping the edit are dropped and later ones shifted.
    /// Returns the lines touched by the edit, in post-edit numbering.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds or not on char boundaries, like
    /// [`String::replace_range`].
    pub fn edit(&mut self, range: Range<usize>, replacement: &str) -> Range<usize> {
        self.text.replace_range(range.clone(), replacement);
        self.index_lines();

        let removed = range.end - range.start;
        let inserted = replacement.len();
        for ranges in self.indicators.values_mut() {
            ranges.retain(|r| !overlaps(r, &range));
            for r in ranges.iter_mut().filter(|r| r.start >= range.end) {
                r.start = r.start - removed + inserted;
                r.end = r.end - removed + inserted;
            }
        }

        let first = self.line_of(range.start);
        let last = self.line_of(range.start + inserted);
        first..last + 1
    }

    fn index_lines(&mut self) {
        self.line_starts.clear();
        self.line_starts.push(0);
        self.line_starts.extend(
            self.text
                .match_indices('\n')
                .map(|(offset, _)| offset + 1),
        );
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

impl Document for Buffer {
    fn pending(&self) -> &PendingWork {
        &self.pending
    }

    fn pending_mut(&mut self) -> &mut PendingWork {
        &mut self.pending
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

impl TextDocument for Buffer {
    fn text(&self) -> &str {
        &self.text
    }

    fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    fn line_range(&self, line: usize) -> Option<Range<usize>> {
        let start = *self.line_starts.get(line)?;
        let mut end = match self.line_starts.get(line + 1) {
            Some(next) => next - 1,
            None => self.text.len(),
        };
        if self.text[start..end].ends_with('\r') {
            end -= 1;
        }
        Some(start..end)
    }

    fn indicators(&self, kind: Indicator) -> &[Range<usize>] {
        self.indicators.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn add_indicator(&mut self, kind: Indicator, range: Range<usize>) {
        let ranges = self.indicators.entry(kind).or_default();
        let at = ranges.partition_point(|r| r.start <= range.start);
        ranges.insert(at, range);
    }

    fn clear_indicators(&mut self, kind: Indicator, within: Range<usize>) {
        if let Some(ranges) = self.indicators.get_mut(&kind) {
            ranges.retain(|r| !overlaps(r, &within));
        }
    }

    fn clear_all_indicators(&mut self, kind: Indicator) {
        self.indicators.remove(&kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_ranges_exclude_terminators() {
        let buffer = Buffer::new("a", "one\r\ntwo\n\nfour");
        assert_eq!(buffer.line_count(), 4);
        assert_eq!(buffer.line(0), Some("one"));
        assert_eq!(buffer.line(1), Some("two"));
        assert_eq!(buffer.line(2), Some(""));
        assert_eq!(buffer.line(3), Some("four"));
        assert_eq!(buffer.line(4), None);
    }

    #[test]
    fn edit_shifts_later_indicators_and_drops_overlapping() {
        let mut buffer = Buffer::new("a", "alpha beta\ngamma");
        buffer.add_indicator(Indicator::Misspelling, 0..5);
        buffer.add_indicator(Indicator::Misspelling, 6..10);
        buffer.add_indicator(Indicator::Misspelling, 11..16);

        let lines = buffer.edit(6..10, "b\nb");
        assert_eq!(buffer.text(), "alpha b\nb\ngamma");
        assert_eq!(lines, 0..2);
        assert_eq!(buffer.indicators(Indicator::Misspelling), &[0..5, 10..15]);
    }
}
