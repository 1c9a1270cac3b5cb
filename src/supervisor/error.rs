use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{name} already started: pid={pid:?}")]
    AlreadyStarted { name: String, pid: Option<u32> },
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is not running")]
    NotRunning { name: String },
    #[error("failed to send {signal} to pid {pid}: {source}")]
    Signal {
        signal: nix::sys::signal::Signal,
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },
    #[error("{name} watch task failed: {source}")]
    Watch {
        name: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
