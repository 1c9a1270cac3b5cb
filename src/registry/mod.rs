//! Reader for the agent's persisted offset registry.
//!
//! The agent periodically rewrites a JSON array with one record per source file
//! it has opened, holding the byte offset it has shipped so far. The registry is
//! the only source of truth for "has this file been read", so every
//! reconciliation pass takes a fresh [`Registry`] snapshot.
mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::{FileIdentity, Registry, RegistryRecord, read_registry};
