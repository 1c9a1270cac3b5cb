#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid pilot type `{0}`, expected `filebeat` or `fluentd`")]
    InvalidBackendType(String),
    #[error(transparent)]
    InvalidEntityID(#[from] crate::entity::Error),
    #[error(transparent)]
    Supervisor(#[from] crate::supervisor::Error),
    #[error("{name} watcher already started")]
    AlreadyStarted { name: &'static str },
    #[error("{name} watcher is not running")]
    NotStarted { name: &'static str },
    #[error("{name} watcher has stopped, dropping termination event for `{entity_id}`")]
    Stopped {
        name: &'static str,
        entity_id: crate::entity::EntityID,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
