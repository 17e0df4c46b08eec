//! Incremental spell-checking, a few lines per step.

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;
use std::rc::Rc;

use crate::delayable::Delayable;
use crate::document::{Indicator, TextDocument};
use crate::error::Result;

use super::range::RangeArgs;

pub const SPELL_CHECK: &str = "spell_check";

/// Spell-check backend.
pub trait Dictionary {
    /// Whether `word` is spelled correctly.
    fn check(&self, word: &str) -> bool;
}

impl<W: Dictionary + ?Sized> Dictionary for Rc<W> {
    fn check(&self, word: &str) -> bool {
        (**self).check(word)
    }
}

/// Case-insensitive set of known words.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: HashSet<String>,
}

impl WordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for word in words {
            list.insert(word.as_ref());
        }
        list
    }

    /// Load a word list: one word per line, `#` starts a comment line.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_words(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        ))
    }

    pub fn insert(&mut self, word: &str) {
        self.words.insert(word.to_lowercase());
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Dictionary for WordList {
    fn check(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }
}

/// Marks words the dictionary rejects with [`Indicator::Misspelling`].
pub struct SpellCheck<W> {
    dictionary: W,
    chunk_lines: usize,
}

impl<W: Dictionary> SpellCheck<W> {
    pub const DEFAULT_CHUNK_LINES: usize = 100;

    pub fn new(dictionary: W) -> Self {
        Self {
            dictionary,
            chunk_lines: Self::DEFAULT_CHUNK_LINES,
        }
    }

    /// Lines checked per step.
    pub fn with_chunk_lines(mut self, lines: usize) -> Self {
        self.chunk_lines = lines.max(1);
        self
    }
}

impl<D, W> Delayable<D> for SpellCheck<W>
where
    D: TextDocument,
    W: Dictionary + 'static,
{
    type Args = RangeArgs;

    fn key(&self) -> &str {
        SPELL_CHECK
    }

    fn detach(&mut self, document: &mut D) {
        document.clear_all_indicators(Indicator::Misspelling);
    }

    fn step(&mut self, document: &mut D, args: RangeArgs) -> Result<Option<RangeArgs>> {
        let lines = args.resolve(document.line_count());
        let stop = lines.start.saturating_add(self.chunk_lines).min(lines.end);

        for line in lines.start..stop {
            let Some(range) = document.line_range(line) else {
                break;
            };
            let misspelled: Vec<Range<usize>> = words(&document.text()[range.clone()])
                .filter(|word| !self.dictionary.check(word.text))
                .map(|word| range.start + word.span.start..range.start + word.span.end)
                .collect();

            document.clear_indicators(Indicator::Misspelling, range);
            for span in misspelled {
                document.add_indicator(Indicator::Misspelling, span);
            }
        }

        if stop >= lines.end {
            Ok(None)
        } else {
            Ok(Some(RangeArgs {
                start: stop,
                end: args.end,
            }))
        }
    }

    fn merge(&self, old: RangeArgs, new: RangeArgs) -> RangeArgs {
        old.merge(new)
    }
}

/// A checkable word and its byte span in the scanned text.
#[derive(Debug, PartialEq, Eq)]
struct Word<'a> {
    text: &'a str,
    span: Range<usize>,
}

/// Words worth checking: letter runs with inner apostrophes, at least two
/// letters long. Tokens touching digits or underscores are identifiers, not
/// words, and are skipped.
fn words(text: &str) -> impl Iterator<Item = Word<'_>> {
    let is_token = |c: char| c.is_alphanumeric() || c == '\'' || c == '_';
    let mut rest = text.char_indices().peekable();

    std::iter::from_fn(move || {
        loop {
            let (start, _) = rest.find(|(_, c)| is_token(*c))?;
            let mut end = text.len();
            while let Some(&(offset, c)) = rest.peek() {
                if !is_token(c) {
                    end = offset;
                    break;
                }
                rest.next();
            }

            let token = &text[start..end];
            let trimmed = token.trim_matches('\'');
            if trimmed.chars().count() < 2
                || trimmed.chars().any(|c| c.is_numeric() || c == '_')
            {
                continue;
            }
            let lead = token.len() - token.trim_start_matches('\'').len();
            let span = start + lead..start + lead + trimmed.len();
            return Some(Word {
                text: trimmed,
                span,
            });
        }
    })
}
