use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Error, Result};

/// Executable and arguments the agent is launched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl AgentCommand {
    pub fn new(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Launches the agent with its output streams passed through to ours.
    fn launch(&self) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| Error::Launch {
                program: self.program.clone(),
                source,
            })
    }
}

/// Lifecycle state of the supervised agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Starting,
    Running { pid: Option<u32> },
    Crashed,
}

/// Owns the agent process and restarts it whenever it exits.
#[derive(Debug)]
pub struct Supervisor {
    name: &'static str,
    command: AgentCommand,
    state: Arc<watch::Sender<ProcessState>>,
    restarts: Arc<AtomicU64>,
    watch_handle: Option<JoinHandle<Result<()>>>,
}

impl Supervisor {
    pub fn new(name: &'static str, command: AgentCommand) -> Self {
        let (state, _) = watch::channel(ProcessState::Stopped);
        Self {
            name,
            command,
            state: Arc::new(state),
            restarts: Arc::new(AtomicU64::new(0)),
            watch_handle: None,
        }
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions of the agent.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state.subscribe()
    }

    /// Returns the pid of the running agent, if any.
    pub fn pid(&self) -> Option<u32> {
        match self.state() {
            ProcessState::Running { pid } => pid,
            _ => None,
        }
    }

    /// Number of times the agent has been relaunched after exiting.
    pub fn restart_count(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Launches the agent and starts watching it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if the agent is already supervised.
    /// - [`Error::Launch`] if the executable cannot be started.
    pub fn start(&mut self) -> Result<()> {
        if self
            .watch_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            let pid = self.pid();
            log::info!("{} started: pid={:?}", self.name, pid);
            return Err(Error::AlreadyStarted {
                name: self.name.to_owned(),
                pid,
            });
        }

        log::info!("starting {}", self.name);
        self.state.send_replace(ProcessState::Starting);
        let child = match self.command.launch() {
            Ok(child) => child,
            Err(err) => {
                log::error!("{} start fail: {}", self.name, err);
                self.state.send_replace(ProcessState::Stopped);
                return Err(err);
            }
        };
        self.state.send_replace(ProcessState::Running { pid: child.id() });

        self.watch_handle = Some(tokio::spawn(supervise(
            self.name,
            self.command.clone(),
            child,
            Arc::clone(&self.state),
            Arc::clone(&self.restarts),
        )));
        Ok(())
    }

    /// Sends `signal` to the running agent.
    ///
    /// # Errors
    ///
    /// - [`Error::NotRunning`] if no agent pid is known.
    /// - [`Error::Signal`] if delivering the signal fails.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        let pid = self.pid().ok_or_else(|| Error::NotRunning {
            name: self.name.to_owned(),
        })?;
        let raw = i32::try_from(pid).map_err(|_| Error::Signal {
            signal,
            pid,
            source: nix::errno::Errno::ESRCH,
        })?;
        kill(Pid::from_raw(raw), signal).map_err(|source| Error::Signal {
            signal,
            pid,
            source,
        })
    }

    /// Waits until supervision ends, which only happens when a relaunch fails.
    ///
    /// # Errors
    ///
    /// - [`Error::NotRunning`] if [`Supervisor::start`] was never called successfully.
    /// - [`Error::Launch`] with the relaunch failure that ended supervision.
    /// - [`Error::Watch`] if the watch task panicked or was cancelled.
    pub async fn wait(&mut self) -> Result<()> {
        let handle = self.watch_handle.take().ok_or_else(|| Error::NotRunning {
            name: self.name.to_owned(),
        })?;
        handle.await.map_err(|source| Error::Watch {
            name: self.name.to_owned(),
            source,
        })?
    }
}

/// Waits for `child` to exit and relaunches it, forever.
async fn supervise(
    name: &'static str,
    command: AgentCommand,
    mut child: Child,
    state: Arc<watch::Sender<ProcessState>>,
    restarts: Arc<AtomicU64>,
) -> Result<()> {
    loop {
        let pid = child.id();
        log::info!("{name} started: pid={pid:?}");

        match child.wait().await {
            Ok(status) => log::error!("{name} exited: pid={pid:?}, status={status}"),
            Err(err) => log::error!("{name} exited: pid={pid:?}, error={err}"),
        }
        state.send_replace(ProcessState::Crashed);

        log::warn!("{name} exited and try to restart");
        restarts.fetch_add(1, Ordering::Relaxed);
        state.send_replace(ProcessState::Starting);
        child = match command.launch() {
            Ok(child) => child,
            Err(err) => {
                log::error!("{name} start fail: {err}");
                state.send_replace(ProcessState::Stopped);
                return Err(err);
            }
        };
        state.send_replace(ProcessState::Running { pid: child.id() });
    }
}
