//! Built-in delayables for text documents.

pub mod range;
pub mod smart_highlight;
pub mod spell_check;

pub use range::RangeArgs;
pub use smart_highlight::{SMART_HIGHLIGHT, SearchArgs, SmartHighlight};
pub use spell_check::{Dictionary, SPELL_CHECK, SpellCheck, WordList};

use crate::delayable::DelayableRegistry;
use crate::document::TextDocument;

/// Register the built-in delayables. Every spell checker an engine builds
/// shares `dictionary`.
pub fn register_builtins<D, W>(registry: &mut DelayableRegistry<D>, dictionary: W)
where
    D: TextDocument,
    W: Dictionary + Clone + 'static,
{
    registry
        .register(SPELL_CHECK, move || SpellCheck::new(dictionary.clone()))
        .register(SMART_HIGHLIGHT, SmartHighlight::new);
}
