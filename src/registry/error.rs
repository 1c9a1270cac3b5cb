use std::path::PathBuf;

use crate::fsutil;

/// Errors that leave the agent's read offsets unknown for the current pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] fsutil::FileOpenError),
    #[error("failed to parse registry `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
