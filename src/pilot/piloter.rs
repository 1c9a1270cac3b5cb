use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::sync::mpsc;

use super::{AgentLayout, BackendKind, Error, Result};
use crate::classifier::PathClassifier;
use crate::config::ConfigStore;
use crate::entity::EntityID;
use crate::reconcile::{
    Reconciler, TerminationSink, WatcherHandle, spawn_watcher, termination_channel,
};
use crate::supervisor::Supervisor;

/// Lifecycle contract shared by every backend.
pub trait Piloter {
    fn name(&self) -> &'static str;

    /// Starts the agent and the reconciliation watcher.
    fn start(&mut self) -> Result<()>;
    /// Ends the reconciliation watcher. The agent process keeps running.
    fn stop(&mut self) -> Result<()>;
    /// Asks the agent to pick up changed configs, where the backend supports it.
    fn reload(&self) -> Result<()>;

    fn base_conf(&self) -> &Path;
    fn conf_home(&self) -> &Path;
    fn conf_path(&self, entity_id: &EntityID) -> PathBuf;

    /// Queues a terminated entity for config cleanup. Repeated calls for the
    /// same entity have no further effect.
    fn on_termination_event(&self, entity_id: &str) -> Result<()>;
}

/// Drives one log-shipping agent and cleans up after terminated entities.
pub struct Pilot {
    kind: BackendKind,
    layout: AgentLayout,
    base_dir: PathBuf,
    scan_interval: Duration,
    supervisor: Supervisor,
    sink: TerminationSink,
    events: Option<mpsc::UnboundedReceiver<EntityID>>,
    watcher: Option<WatcherHandle>,
}

impl Pilot {
    /// Creates a pilot for the stock layout of `kind`.
    ///
    /// `base_dir` is where the host root filesystem is mounted; empty means `/`.
    pub fn new(kind: BackendKind, base_dir: impl Into<PathBuf>, scan_interval: Duration) -> Self {
        Self::with_layout(kind, AgentLayout::for_kind(kind), base_dir, scan_interval)
    }

    pub fn with_layout(
        kind: BackendKind,
        layout: AgentLayout,
        base_dir: impl Into<PathBuf>,
        scan_interval: Duration,
    ) -> Self {
        let (sink, events) = termination_channel();
        Self {
            kind,
            supervisor: Supervisor::new(kind.name(), layout.command.clone()),
            layout,
            base_dir: base_dir.into(),
            scan_interval,
            sink,
            events: Some(events),
            watcher: None,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Returns a handle event sources can use from any task.
    pub fn termination_sink(&self) -> TerminationSink {
        self.sink.clone()
    }

    /// Waits until the agent can no longer be supervised.
    ///
    /// # Errors
    ///
    /// Returns the supervisor failure that ended supervision.
    pub async fn wait(&mut self) -> Result<()> {
        self.supervisor.wait().await?;
        Ok(())
    }
}

impl Piloter for Pilot {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if the watcher was started before. A stopped
    ///   pilot cannot be started again.
    /// - [`Error::Supervisor`] if the agent is already running or cannot be launched.
    fn start(&mut self) -> Result<()> {
        let Some(events) = self.events.take() else {
            return Err(Error::AlreadyStarted { name: self.name() });
        };
        if let Err(err) = self.supervisor.start() {
            self.events = Some(events);
            return Err(err.into());
        }

        let reconciler = Reconciler::new(
            ConfigStore::new(&self.layout.conf_dir, &self.layout.conf_extension),
            &self.layout.registry_path,
            PathClassifier::new(&self.base_dir),
        );
        self.watcher = Some(spawn_watcher(
            self.name(),
            reconciler,
            events,
            self.scan_interval,
        ));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let watcher = self
            .watcher
            .as_mut()
            .ok_or(Error::NotStarted { name: self.kind.name() })?;
        if !watcher.stop() {
            log::debug!("{} watcher already stopped", self.kind);
        }
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        if !self.kind.supports_reload() {
            log::debug!("do not need to reload {}", self.kind);
            return Ok(());
        }
        log::info!("reload {}", self.kind);
        self.supervisor.signal(Signal::SIGHUP)?;
        Ok(())
    }

    fn base_conf(&self) -> &Path {
        &self.layout.base_conf
    }

    fn conf_home(&self) -> &Path {
        &self.layout.conf_dir
    }

    fn conf_path(&self, entity_id: &EntityID) -> PathBuf {
        self.layout
            .conf_dir
            .join(format!("{}.{}", entity_id, self.layout.conf_extension))
    }

    fn on_termination_event(&self, entity_id: &str) -> Result<()> {
        let entity_id = EntityID::new(entity_id)?;
        self.sink
            .notify(entity_id)
            .map_err(|entity_id| Error::Stopped {
                name: self.kind.name(),
                entity_id,
            })
    }
}
