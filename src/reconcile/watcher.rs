use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{Reconciler, WorkingSet};
use crate::entity::EntityID;
use crate::error::ResultOkLogExt;

/// Cloneable handle for reporting terminated entities to the watcher task.
#[derive(Debug, Clone)]
pub struct TerminationSink {
    tx: mpsc::UnboundedSender<EntityID>,
}

impl TerminationSink {
    /// Queues `entity_id` for reconciliation.
    ///
    /// Returns the id back if the watcher task is gone.
    pub fn notify(&self, entity_id: EntityID) -> Result<(), EntityID> {
        self.tx.send(entity_id).map_err(|err| err.0)
    }
}

/// Creates the channel between termination notifications and the watcher task.
///
/// Notifications sent before the watcher starts are queued.
pub fn termination_channel() -> (TerminationSink, mpsc::UnboundedReceiver<EntityID>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TerminationSink { tx }, rx)
}

/// Running watcher task.
#[derive(Debug)]
pub struct WatcherHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<WorkingSet>,
}

impl WatcherHandle {
    /// Asks the watcher to finish after any in-flight pass.
    ///
    /// Stopping takes precedence over pending ticks and notifications.
    /// Notifications queued before the watcher exits still end up in the
    /// returned working set; later ones are refused.
    ///
    /// Returns `false` if it was already asked or has already exited.
    pub fn stop(&mut self) -> bool {
        self.stop_tx
            .take()
            .is_some_and(|stop_tx| stop_tx.send(()).is_ok())
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Waits for the watcher to exit and returns the entities it still tracked.
    pub async fn join(self) -> Option<WorkingSet> {
        self.join_handle.await.ok_log()
    }
}

/// Spawns the task that owns the working set.
///
/// The task inserts every entity received on `events`, runs a reconciliation
/// pass every `period` (the first one `period` after start), and exits when
/// stopped. Passes run on the blocking pool since they walk the filesystem.
pub fn spawn_watcher(
    name: &'static str,
    reconciler: Reconciler,
    events: mpsc::UnboundedReceiver<EntityID>,
    period: Duration,
) -> WatcherHandle {
    let (stop_tx, stop_rx) = oneshot::channel();
    let join_handle = tokio::spawn(watch(name, Arc::new(reconciler), events, stop_rx, period));
    WatcherHandle {
        stop_tx: Some(stop_tx),
        join_handle,
    }
}

async fn watch(
    name: &'static str,
    reconciler: Arc<Reconciler>,
    mut events: mpsc::UnboundedReceiver<EntityID>,
    mut stop_rx: oneshot::Receiver<()>,
    period: Duration,
) -> WorkingSet {
    log::info!("{name} watcher start");
    let mut tracked = WorkingSet::new();
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = interval.tick() => {
                log::trace!("{name} watcher scan");
                let reconciler = Arc::clone(&reconciler);
                let pass = tokio::task::spawn_blocking(move || {
                    let result = reconciler.reconcile(&mut tracked);
                    (tracked, result)
                })
                .await;
                match pass {
                    Ok((returned, result)) => {
                        tracked = returned;
                        if let Some(summary) = result.ok_log_at(log::Level::Warn) {
                            log::debug!(
                                "{name} watcher scan done: removed={}, vanished={}, retained={}",
                                summary.removed.len(),
                                summary.vanished.len(),
                                summary.retained.len()
                            );
                        }
                    }
                    Err(err) => {
                        log::error!("{name} watcher scan panicked, stop watching: {err}");
                        return WorkingSet::new();
                    }
                }
            }
            Some(entity_id) = events.recv() => track(&mut tracked, entity_id),
        }
    }

    // refuse new notifications but keep the ones already queued
    events.close();
    while let Ok(entity_id) = events.try_recv() {
        track(&mut tracked, entity_id);
    }
    log::info!("{name} watcher stop");
    tracked
}

fn track(tracked: &mut WorkingSet, entity_id: EntityID) {
    if tracked.insert(entity_id.clone()) {
        log::info!("begin to watch log config: entity={entity_id}");
    } else {
        log::debug!("log config already watched: entity={entity_id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PathClassifier;
    use crate::config::ConfigStore;

    fn id(raw: &str) -> EntityID {
        EntityID::new(raw).unwrap()
    }

    fn reconciler(root: &std::path::Path) -> Reconciler {
        Reconciler::new(
            ConfigStore::new(root.join("conf.d"), "yml"),
            root.join("registry"),
            PathClassifier::new(root),
        )
    }

    #[tokio::test]
    async fn test_repeated_notification_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let (sink, rx) = termination_channel();
        let mut handle =
            spawn_watcher("test", reconciler(root.path()), rx, Duration::from_secs(3600));

        sink.notify(id("c1")).unwrap();
        sink.notify(id("c1")).unwrap();
        sink.notify(id("c2")).unwrap();
        tokio::task::yield_now().await;
        assert!(handle.stop());

        let tracked = handle.join().await.unwrap();
        assert_eq!(tracked, WorkingSet::from([id("c1"), id("c2")]));
    }

    #[tokio::test]
    async fn test_tick_removes_finished_config() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("conf.d")).unwrap();
        std::fs::write(root.path().join("conf.d/c1.yml"), "paths: []\n").unwrap();
        std::fs::write(root.path().join("conf.d/c2.yml"), "paths: [unclosed").unwrap();
        std::fs::write(root.path().join("registry"), "[]").unwrap();

        let (sink, rx) = termination_channel();
        let mut handle =
            spawn_watcher("test", reconciler(root.path()), rx, Duration::from_millis(20));
        sink.notify(id("c1")).unwrap();
        sink.notify(id("c2")).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while root.path().join("conf.d/c1.yml").exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("config was not removed in time");

        handle.stop();
        let tracked = handle.join().await.unwrap();
        assert_eq!(tracked, WorkingSet::from([id("c2")]));
    }

    #[tokio::test]
    async fn test_stop_wins_over_steady_notifications() {
        let root = tempfile::tempdir().unwrap();
        let (sink, rx) = termination_channel();
        let mut handle =
            spawn_watcher("test", reconciler(root.path()), rx, Duration::from_secs(3600));

        let producer = tokio::spawn(async move {
            let mut sent = 0u64;
            while sink.notify(id(&format!("c{}", sent % 64))).is_ok() {
                sent += 1;
                tokio::task::yield_now().await;
            }
            sent
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.stop());

        let tracked = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("watcher did not stop under a steady stream of notifications")
            .unwrap();
        assert!(tracked.len() <= 64);
        // the producer is refused once the watcher has stopped
        tokio::time::timeout(Duration::from_secs(5), producer)
            .await
            .expect("notifications were still accepted after stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_notify_after_stop_fails() {
        let root = tempfile::tempdir().unwrap();
        let (sink, rx) = termination_channel();
        let mut handle =
            spawn_watcher("test", reconciler(root.path()), rx, Duration::from_secs(3600));
        assert!(handle.stop());
        assert!(!handle.stop());
        handle.join().await.unwrap();

        assert_eq!(sink.notify(id("c1")).unwrap_err(), id("c1"));
    }
}
