//! Per-entity collection configs on disk.
//!
//! Every tracked entity owns exactly one file `<entity-id>.<ext>` inside the
//! agent's config directory. The files are generated elsewhere; this module only
//! reads them, extracts the glob patterns listed under `paths`, and deletes them
//! once the reconciler decides they are no longer needed.
mod error;
mod expand;
mod store;

pub use error::{Error, Result};
pub use expand::expand_vars;
pub use store::{ActivePathIndex, ConfigStore, EntityConfig};
