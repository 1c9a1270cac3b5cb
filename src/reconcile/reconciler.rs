use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use super::{Error, Result};
use crate::classifier::{PathClassifier, Storage};
use crate::config::{ActivePathIndex, ConfigStore, EntityConfig};
use crate::entity::EntityID;
use crate::fsutil;
use crate::registry::{self, Registry};

/// Terminated entities whose configs still exist.
pub type WorkingSet = BTreeSet<EntityID>;

/// Reason an entity's config must be kept for now.
#[derive(Debug)]
pub enum Blocker {
    /// A durable file has unread bytes and no live config collects it.
    Unread {
        file: PathBuf,
        offset: i64,
        size: u64,
    },
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },
    /// A file matched by the pattern could not be inspected.
    Unreadable { path: PathBuf, error: String },
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocker::Unread { file, offset, size } => write!(
                f,
                "`{}` does not finish to read and is not collected by another config (offset={}, size={})",
                file.display(),
                offset,
                size
            ),
            Blocker::InvalidPattern { pattern, source } => {
                write!(f, "invalid path pattern `{pattern}`: {source}")
            }
            Blocker::Unreadable { path, error } => {
                write!(f, "failed to inspect `{}`: {}", path.display(), error)
            }
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Configs deleted during this pass.
    pub removed: Vec<EntityID>,
    /// Entities whose config was already gone.
    pub vanished: Vec<EntityID>,
    /// Entities kept for the next pass.
    pub retained: Vec<EntityID>,
}

#[derive(Debug)]
pub struct Reconciler {
    store: ConfigStore,
    registry_path: PathBuf,
    classifier: PathClassifier,
}

impl Reconciler {
    pub fn new(
        store: ConfigStore,
        registry_path: impl Into<PathBuf>,
        classifier: PathClassifier,
    ) -> Self {
        Self {
            store,
            registry_path: registry_path.into(),
            classifier,
        }
    }

    /// Runs one pass over every entity in `tracked`.
    ///
    /// Removed and vanished entities leave `tracked`; everything else stays.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving `tracked` and the config directory untouched, if
    /// the registry or the config directory cannot be read.
    pub fn reconcile(&self, tracked: &mut WorkingSet) -> Result<TickSummary> {
        let mut summary = TickSummary::default();
        if tracked.is_empty() {
            return Ok(summary);
        }

        let registry = registry::read_registry(&self.registry_path)?;
        let claimed = self
            .store
            .paths_claimed_by_others(tracked)
            .map_err(Error::ConfigsUnavailable)?;
        log::debug!(
            "reconciling {} entities against {} registry records and {} active paths",
            tracked.len(),
            registry.len(),
            claimed.len()
        );

        let entities: Vec<EntityID> = tracked.iter().cloned().collect();
        for entity_id in entities {
            let config = match self.store.load_config(&entity_id) {
                Ok(config) => config,
                Err(err) if err.is_not_found() => {
                    log::info!("log config has been removed, stop tracking: entity={entity_id}");
                    tracked.remove(&entity_id);
                    summary.vanished.push(entity_id);
                    continue;
                }
                Err(err) => {
                    log::warn!("keeping log config: entity={entity_id}, error={err}");
                    summary.retained.push(entity_id);
                    continue;
                }
            };

            if let Some(blocker) = self.find_blocker(&entity_id, &config, &registry, &claimed) {
                log::info!("keeping log config: entity={entity_id}, reason={blocker}");
                summary.retained.push(entity_id);
                continue;
            }

            log::info!("try to remove log config: entity={entity_id}");
            match self.store.remove(&entity_id) {
                Ok(()) => {
                    tracked.remove(&entity_id);
                    summary.removed.push(entity_id);
                }
                Err(err) if err.is_not_found() => {
                    tracked.remove(&entity_id);
                    summary.vanished.push(entity_id);
                }
                Err(err) => {
                    log::error!("remove log config fail: entity={entity_id}, error={err}");
                    summary.retained.push(entity_id);
                }
            }
        }

        Ok(summary)
    }

    /// Returns the first reason `config` cannot be deleted yet, if any.
    ///
    /// Unread data on ephemeral storage never blocks: the files are expected to
    /// vanish together with the entity.
    fn find_blocker(
        &self,
        entity_id: &EntityID,
        config: &EntityConfig,
        registry: &Registry,
        claimed: &ActivePathIndex,
    ) -> Option<Blocker> {
        for pattern in &config.paths {
            let storage = self.classifier.classify(pattern);
            let matches = match glob::glob(pattern) {
                Ok(matches) => matches,
                Err(source) => {
                    return Some(Blocker::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    });
                }
            };

            for entry in matches {
                let file = match entry {
                    Ok(file) => file,
                    Err(err) => {
                        return Some(Blocker::Unreadable {
                            path: err.path().to_path_buf(),
                            error: err.error().to_string(),
                        });
                    }
                };
                let size = match fsutil::file_size(&file) {
                    Ok(Some(size)) => size,
                    Ok(None) => continue,
                    Err(err) => {
                        return Some(Blocker::Unreadable {
                            path: file,
                            error: err.to_string(),
                        });
                    }
                };
                let Some(record) = registry.get(&file) else {
                    log::warn!(
                        "registry not exist: entity={}, path={}",
                        entity_id,
                        file.display()
                    );
                    continue;
                };
                if !record.is_behind(size) {
                    continue;
                }

                match storage {
                    Storage::Ephemeral => {
                        log::info!(
                            "does not finish to read, ephemeral storage: entity={}, path={}, offset={}, size={}",
                            entity_id,
                            file.display(),
                            record.offset,
                            size
                        );
                    }
                    Storage::Durable => match claimed.get(pattern) {
                        Some(owner) => log::debug!(
                            "does not finish to read, still collected: entity={}, path={}, owner={}",
                            entity_id,
                            file.display(),
                            owner
                        ),
                        None => {
                            return Some(Blocker::Unread {
                                file,
                                offset: record.offset,
                                size,
                            });
                        }
                    },
                }
            }
        }
        None
    }
}
