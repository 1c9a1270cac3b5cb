//! Uniform front end over the supported log-shipping agents.
//!
//! A [`Pilot`] pairs one [`BackendKind`] with its [`AgentLayout`], supervises the
//! agent process, and runs the reconciliation watcher that cleans up configs of
//! terminated entities. Callers drive it through the [`Piloter`] trait.
mod backend;
mod error;
mod piloter;

pub use backend::{AgentLayout, BackendKind, ENV_PILOT_TYPE};
pub use error::{Error, Result};
pub use piloter::{Pilot, Piloter};
