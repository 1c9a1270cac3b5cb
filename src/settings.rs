//! Environment-derived runtime settings.
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pilot::{self, BackendKind, ENV_PILOT_TYPE};

/// Directory where the host root filesystem is mounted.
pub const ENV_BASE_DIR: &str = "PILOT_BASE_DIR";
/// Seconds between two reconciliation passes.
pub const ENV_SCAN_INTERVAL: &str = "PILOT_SCAN_INTERVAL_SECS";
/// Config template handed to the external config generator.
pub const ENV_TEMPLATE: &str = "PILOT_TEMPLATE";

const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment variable `PILOT_TYPE`: {0}")]
    Backend(#[from] pilot::Error),
    #[error("invalid value `{value}` for `PILOT_SCAN_INTERVAL_SECS`: {source}")]
    ScanInterval {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("`PILOT_SCAN_INTERVAL_SECS` must be greater than zero")]
    ZeroScanInterval,
    #[error("failed to resolve base directory `{path}`: {source}")]
    BaseDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`PILOT_TEMPLATE` is required")]
    MissingTemplate,
    #[error("template file `{path}` is not readable: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: BackendKind,
    /// Absolute host mount directory; empty when the host root is `/`.
    pub base_dir: PathBuf,
    pub scan_interval: Duration,
    pub template: PathBuf,
}

impl Settings {
    /// Reads the settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through `lookup`.
    ///
    /// # Errors
    ///
    /// - [`Error::Backend`] if the backend variable is unset or unrecognised.
    /// - [`Error::ScanInterval`] or [`Error::ZeroScanInterval`] for a bad interval.
    /// - [`Error::BaseDir`] if a relative base directory cannot be resolved.
    /// - [`Error::MissingTemplate`] if no template is configured.
    /// - [`Error::Template`] if the template cannot be read.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = lookup(ENV_PILOT_TYPE).unwrap_or_default().parse::<BackendKind>()?;

        let base_dir = normalize_base_dir(lookup(ENV_BASE_DIR).unwrap_or_default())?;

        let scan_interval = match lookup(ENV_SCAN_INTERVAL) {
            None => DEFAULT_SCAN_INTERVAL,
            Some(value) => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|source| Error::ScanInterval {
                        value: value.clone(),
                        source,
                    })?;
                if secs == 0 {
                    return Err(Error::ZeroScanInterval);
                }
                Duration::from_secs(secs)
            }
        };

        let template = lookup(ENV_TEMPLATE)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .ok_or(Error::MissingTemplate)?;
        std::fs::File::open(&template).map_err(|source| Error::Template {
            path: template.clone(),
            source,
        })?;

        Ok(Self {
            backend,
            base_dir,
            scan_interval,
            template,
        })
    }
}

/// Makes `raw` absolute and maps the filesystem root to an empty path.
fn normalize_base_dir(raw: String) -> Result<PathBuf> {
    if raw.is_empty() {
        return Ok(PathBuf::new());
    }
    let path = std::path::absolute(&raw).map_err(|source| Error::BaseDir {
        path: PathBuf::from(&raw),
        source,
    })?;
    if path == Path::new("/") {
        return Ok(PathBuf::new());
    }
    Ok(path)
}
