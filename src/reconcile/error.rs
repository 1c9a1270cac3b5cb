/// Errors that make a whole reconciliation pass unsafe to run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("registry unavailable, skipping reconciliation: {0}")]
    RegistryUnavailable(#[from] crate::registry::Error),
    #[error("active configs unavailable, skipping reconciliation: {0}")]
    ConfigsUnavailable(#[source] crate::config::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
