//! Decides when the config of a terminated entity can be deleted.
//!
//! Terminated entities are collected in a [`WorkingSet`] owned by a single
//! watcher task. On every tick the [`Reconciler`] takes one registry snapshot
//! and one index of paths still claimed by live configs, then removes each
//! tracked config whose collected files are fully read, gone, or still covered
//! by another live config.
mod error;
mod reconciler;
mod watcher;

pub use error::{Error, Result};
pub use reconciler::{Blocker, Reconciler, TickSummary, WorkingSet};
pub use watcher::{TerminationSink, WatcherHandle, spawn_watcher, termination_channel};
