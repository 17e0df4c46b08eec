//! The delayable contract and the key -> factory registry.
//!
//! A delayable is a pluggable kind of background work that runs in short,
//! resumable steps. The engine stores each delayable's arguments
//! type-erased and hands them back to the delayable that owns them.

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::model::{Document, ErasedArgs};

/// A kind of incremental background work over documents of type `D`.
pub trait Delayable<D: Document>: 'static {
    /// Continuation arguments. Whatever a step needs to resume.
    type Args: fmt::Debug + 'static;

    /// Stable key this delayable is registered and enqueued under.
    fn key(&self) -> &str;

    /// Set up per-document state. Must be idempotent.
    fn attach(&mut self, document: &mut D) {
        let _ = document;
    }

    /// Undo everything `attach` and previous steps did to the document.
    /// Must be idempotent.
    fn detach(&mut self, document: &mut D) {
        let _ = document;
    }

    /// Perform one bounded unit of work.
    ///
    /// `Ok(Some(next))` resumes later with `next`, `Ok(None)` finishes the
    /// work item. An error evicts it without retry.
    fn step(&mut self, document: &mut D, args: Self::Args) -> Result<Option<Self::Args>>;

    /// Fold a new request into one that is still pending, covering the
    /// union of the requested work.
    fn merge(&self, old: Self::Args, new: Self::Args) -> Self::Args;
}

/// Object-safe view of a [`Delayable`] with erased arguments.
pub(crate) trait AnyDelayable<D> {
    fn key(&self) -> &str;
    fn attach(&mut self, document: &mut D);
    fn detach(&mut self, document: &mut D);
    fn accepts(&self, args: &dyn Any) -> bool;
    fn step(&mut self, document: &mut D, args: ErasedArgs) -> Result<Option<ErasedArgs>>;
    fn merge(&self, old: ErasedArgs, new: ErasedArgs) -> ErasedArgs;
}

impl<D: Document, T: Delayable<D>> AnyDelayable<D> for T {
    fn key(&self) -> &str {
        <T as Delayable<D>>::key(self)
    }

    fn attach(&mut self, document: &mut D) {
        <T as Delayable<D>>::attach(self, document);
    }

    fn detach(&mut self, document: &mut D) {
        <T as Delayable<D>>::detach(self, document);
    }

    fn accepts(&self, args: &dyn Any) -> bool {
        args.is::<T::Args>()
    }

    fn step(&mut self, document: &mut D, args: ErasedArgs) -> Result<Option<ErasedArgs>> {
        let args = args
            .downcast::<T::Args>()
            .map_err(|_| Error::ArgsMismatch {
                key: <T as Delayable<D>>::key(self).to_string(),
            })?;
        let next = <T as Delayable<D>>::step(self, document, *args)?;
        Ok(next.map(|next| Box::new(next) as ErasedArgs))
    }

    fn merge(&self, old: ErasedArgs, new: ErasedArgs) -> ErasedArgs {
        match (old.downcast::<T::Args>(), new.downcast::<T::Args>()) {
            (Ok(old), Ok(new)) => Box::new(<T as Delayable<D>>::merge(self, *old, *new)),
            // Enqueue checks the type before merging, so only one side can
            // ever be foreign; keep whichever is ours.
            (Err(_), Ok(new)) => new,
            (Ok(old), Err(_)) => old,
            (Err(old), Err(_)) => old,
        }
    }
}

type Factory<D> = Box<dyn Fn() -> Box<dyn AnyDelayable<D>>>;

/// Registry of delayable factories, indexed by key.
///
/// Populated at start-up by each task module; engines resolve string keys
/// through it when a delayable is enabled by name.
pub struct DelayableRegistry<D> {
    factories: IndexMap<String, Factory<D>>,
}

impl<D: Document> DelayableRegistry<D> {
    /// Create an empty registry with no delayables.
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Register a factory under `key`, replacing any previous one.
    ///
    /// The instances it builds should report the same key.
    pub fn register<T, F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        T: Delayable<D>,
        F: Fn() -> T + 'static,
    {
        let key = key.into();
        tracing::debug!(key = %key, "delayable registered");
        self.factories.insert(
            key,
            Box::new(move || Box::new(factory()) as Box<dyn AnyDelayable<D>>),
        );
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a fresh instance for `key`.
    pub(crate) fn create(&self, key: &str) -> Result<Box<dyn AnyDelayable<D>>> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| Error::UnknownDelayable(key.to_string()))?;
        Ok(factory())
    }
}

impl<D: Document> Default for DelayableRegistry<D> {
    fn default() -> Self {
        Self::empty()
    }
}
