//! # delayable-engine
//!
//! Cooperative, time-sliced scheduler for incremental background work
//! (spell-checking, smart-highlighting) over open text documents.
//!
//! A host registers [`delayable::Delayable`] task kinds with an
//! [`engine::Engine`], enqueues work as documents change and calls
//! [`engine::Engine::tick`] while the engine is running. Each tick spends a
//! bounded time budget, shared round-robin across documents and task kinds,
//! and checkpoints exactly where it stopped.

pub mod config;
pub mod delayable;
pub mod delayables;
pub mod document;
pub mod engine;
pub mod error;
pub mod event;
pub mod host;
pub mod model;
pub mod telemetry;

pub use error::{Error, Result};
