//! Highlight every whole-word occurrence of the selected term.

use serde::{Deserialize, Serialize};

use crate::delayable::Delayable;
use crate::document::{Indicator, TextDocument};
use crate::error::Result;

pub const SMART_HIGHLIGHT: &str = "smart_highlight";

/// Search for `term` resuming at byte `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub term: String,
    pub position: usize,
}

impl SearchArgs {
    /// A fresh search from the top of the document.
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            position: 0,
        }
    }
}

/// Marks occurrences with [`Indicator::SmartHighlight`], a chunk of text
/// per step. A new request replaces a pending one: only the latest
/// selection matters.
pub struct SmartHighlight {
    chunk_bytes: usize,
}

impl SmartHighlight {
    pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

    pub fn new() -> Self {
        Self {
            chunk_bytes: Self::DEFAULT_CHUNK_BYTES,
        }
    }

    /// Bytes scanned per step.
    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(1);
        self
    }
}

impl Default for SmartHighlight {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: TextDocument> Delayable<D> for SmartHighlight {
    type Args = SearchArgs;

    fn key(&self) -> &str {
        SMART_HIGHLIGHT
    }

    fn detach(&mut self, document: &mut D) {
        document.clear_all_indicators(Indicator::SmartHighlight);
    }

    fn step(&mut self, document: &mut D, args: SearchArgs) -> Result<Option<SearchArgs>> {
        if args.position == 0 {
            document.clear_all_indicators(Indicator::SmartHighlight);
        }
        if args.term.is_empty() {
            return Ok(None);
        }

        let text = document.text();
        let position = ceil_char_boundary(text, args.position);
        if position >= text.len() {
            return Ok(None);
        }
        let stop = ceil_char_boundary(text, position.saturating_add(self.chunk_bytes));
        // Matches must start before `stop` but may run past it.
        let window_end = ceil_char_boundary(text, stop.saturating_add(args.term.len()));

        let found: Vec<_> = text[position..window_end]
            .match_indices(args.term.as_str())
            .map(|(offset, _)| position + offset)
            .take_while(|start| *start < stop)
            .filter(|start| is_whole_word(text, *start, *start + args.term.len()))
            .map(|start| start..start + args.term.len())
            .collect();

        for range in found {
            document.add_indicator(Indicator::SmartHighlight, range);
        }

        if stop >= document.text().len() {
            Ok(None)
        } else {
            Ok(Some(SearchArgs {
                term: args.term,
                position: stop,
            }))
        }
    }

    fn merge(&self, _old: SearchArgs, new: SearchArgs) -> SearchArgs {
        new
    }
}

/// Smallest char boundary at or after `offset`, capped at the text length.
fn ceil_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset += 1;
    }
    offset
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_word_boundaries() {
        let text = "foo food _foo foo.";
        assert!(is_whole_word(text, 0, 3));
        assert!(!is_whole_word(text, 4, 7));
        assert!(!is_whole_word(text, 10, 13));
        assert!(is_whole_word(text, 14, 17));
    }

    #[test]
    fn boundary_rounds_up_inside_multibyte_chars() {
        let text = "aé";
        assert_eq!(ceil_char_boundary(text, 2), 3);
        assert_eq!(ceil_char_boundary(text, 10), 3);
    }
}
