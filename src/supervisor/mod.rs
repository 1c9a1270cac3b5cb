//! Supervision of the external log-shipping agent process.
//!
//! The agent is started once and restarted every time it exits, with no backoff
//! and no limit on the number of restarts. An agent that can never come up
//! therefore turns into a tight restart loop; only a failure to launch the
//! executable at all ends supervision.
mod error;
mod process;

pub use error::{Error, Result};
pub use process::{AgentCommand, ProcessState, Supervisor};
