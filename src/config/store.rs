use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::expand::expand_vars;
use super::{Error, Result};
use crate::entity::EntityID;
use crate::error::ResultOkLogExt;

/// Glob patterns one config instructs the agent to collect.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct EntityConfig {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Maps a literal path pattern to the entity whose config declares it.
pub type ActivePathIndex = HashMap<String, EntityID>;

/// Accepted top-level shapes of a config file: a single mapping, or a list of
/// agent inputs each carrying its own `paths`.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Single(EntityConfig),
    Inputs(Vec<EntityConfig>),
}

impl From<ConfigDocument> for EntityConfig {
    fn from(doc: ConfigDocument) -> Self {
        match doc {
            ConfigDocument::Single(config) => config,
            ConfigDocument::Inputs(inputs) => EntityConfig {
                paths: inputs.into_iter().flat_map(|input| input.paths).collect(),
            },
        }
    }
}

/// Reads and removes the per-entity config files in one directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    conf_dir: PathBuf,
    extension: String,
}

impl ConfigStore {
    /// Creates a store over `conf_dir` holding files named `<entity-id>.<extension>`.
    pub fn new(conf_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            conf_dir: conf_dir.into(),
            extension: extension.into(),
        }
    }

    /// Returns the path of the config file for `entity_id`, whether or not it exists.
    pub fn conf_path(&self, entity_id: &EntityID) -> PathBuf {
        self.conf_dir.join(format!("{}.{}", entity_id, self.extension))
    }

    /// Loads and parses the config file of `entity_id`.
    ///
    /// `${VAR}` references in `paths` are resolved from the process environment.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the file does not exist.
    /// - [`Error::Read`] if the file cannot be read.
    /// - [`Error::UnresolvedVariable`] if a referenced variable is unset and has no default.
    /// - [`Error::Parse`] if the content is not a valid config document.
    pub fn load_config(&self, entity_id: &EntityID) -> Result<EntityConfig> {
        let path = self.conf_path(entity_id);
        let raw = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound { path: path.clone() }
            } else {
                Error::Read {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        parse_config(&raw, &path, |name| std::env::var(name).ok())
    }

    /// Loads every parseable config in the directory, keyed by entity.
    ///
    /// Files with another extension or a name that is not a valid entity id are
    /// ignored. Files that fail to load are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadDir`] if the directory itself cannot be listed.
    pub fn enumerate_configs(&self) -> Result<BTreeMap<EntityID, EntityConfig>> {
        let entries = std::fs::read_dir(&self.conf_dir).map_err(|source| Error::ReadDir {
            path: self.conf_dir.clone(),
            source,
        })?;

        let mut configs = BTreeMap::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    log::warn!(
                        "failed to read entry of config directory `{}`: {}",
                        self.conf_dir.display(),
                        source
                    );
                    continue;
                }
            };
            let Some(entity_id) = self.entity_id_of(&entry.path()) else {
                continue;
            };
            if let Some(config) = self.load_config(&entity_id).ok_log_at(log::Level::Warn) {
                configs.insert(entity_id, config);
            }
        }
        Ok(configs)
    }

    /// Indexes the path patterns declared by every config not in `excluded`.
    ///
    /// When several configs declare the same pattern, the entity whose config
    /// comes first in id order is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadDir`] if the directory cannot be listed.
    pub fn paths_claimed_by_others(
        &self,
        excluded: &BTreeSet<EntityID>,
    ) -> Result<ActivePathIndex> {
        let mut index = ActivePathIndex::new();
        for (entity_id, config) in self.enumerate_configs()? {
            if excluded.contains(&entity_id) {
                continue;
            }
            for path in config.paths {
                index.entry(path).or_insert_with(|| entity_id.clone());
            }
        }
        Ok(index)
    }

    /// Deletes the config file of `entity_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the file is already gone.
    /// - [`Error::Remove`] for any other I/O failure.
    pub fn remove(&self, entity_id: &EntityID) -> Result<()> {
        let path = self.conf_path(entity_id);
        std::fs::remove_file(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound { path: path.clone() }
            } else {
                Error::Remove {
                    path: path.clone(),
                    source,
                }
            }
        })
    }

    fn entity_id_of(&self, path: &Path) -> Option<EntityID> {
        if path.extension()?.to_str()? != self.extension {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        EntityID::new(stem).ok()
    }
}

/// Parses `raw` and resolves variable references inside the collected paths.
///
/// Variables in other fields are left alone; they are the agent's business.
fn parse_config(
    raw: &str,
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<EntityConfig> {
    if raw.trim().is_empty() {
        return Ok(EntityConfig::default());
    }

    let doc: ConfigDocument = serde_yaml::from_str(raw).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let config = EntityConfig::from(doc);
    let paths = config
        .paths
        .iter()
        .map(|pattern| {
            expand_vars(pattern, &lookup).map_err(|name| Error::UnresolvedVariable {
                name,
                path: path.to_path_buf(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(EntityConfig { paths })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityID {
        EntityID::new(raw).unwrap()
    }

    fn no_vars(_: &str) -> Option<String> {
        None
    }

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let store = ConfigStore::new(dir.path(), "yml");
        (dir, store)
    }

    #[test]
    fn test_parse_mapping() {
        let config = parse_config(
            "paths:\n  - /var/log/a.log\n  - /var/log/b*.log\n",
            Path::new("/dummy"),
            no_vars,
        )
        .unwrap();
        assert_eq!(config.paths, vec!["/var/log/a.log", "/var/log/b*.log"]);
    }

    #[test]
    fn test_parse_input_list() {
        let raw = "\
- type: log
  enabled: true
  paths:
      - /host/var/lib/docker/containers/c1/*.log
- type: log
  paths:
      - /host/data/app/out.log
";
        let config = parse_config(raw, Path::new("/dummy"), no_vars).unwrap();
        assert_eq!(
            config.paths,
            vec![
                "/host/var/lib/docker/containers/c1/*.log",
                "/host/data/app/out.log"
            ]
        );
    }

    #[test]
    fn test_parse_with_variables() {
        let raw = "paths:\n  - ${LOG_ROOT:/var/log}/app.log\n  - ${DATA_ROOT}/out.log\n";
        let config = parse_config(raw, Path::new("/dummy"), |name| {
            (name == "DATA_ROOT").then(|| "/data".to_owned())
        })
        .unwrap();
        assert_eq!(config.paths, vec!["/var/log/app.log", "/data/out.log"]);

        let err = parse_config(raw, Path::new("/dummy"), no_vars).unwrap_err();
        match err {
            Error::UnresolvedVariable { name, .. } => assert_eq!(name, "DATA_ROOT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_ignores_variables_outside_paths() {
        let raw = "paths:\n  - /var/log/app.log\noutput: ${FILEBEAT_OUTPUT}\n";
        let config = parse_config(raw, Path::new("/dummy"), no_vars).unwrap();
        assert_eq!(config.paths, vec!["/var/log/app.log"]);
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert_eq!(
            parse_config("  \n", Path::new("/dummy"), no_vars).unwrap(),
            EntityConfig::default()
        );
        let err = parse_config("paths: [unclosed", Path::new("/dummy"), no_vars).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_load_config() {
        let (_dir, store) = store_with(&[("c1.yml", "paths: [/a.log]\n")]);
        assert_eq!(store.load_config(&id("c1")).unwrap().paths, vec!["/a.log"]);
        assert!(store.load_config(&id("c2")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_enumerate_skips_invalid_and_foreign_files() {
        let (_dir, store) = store_with(&[
            ("c1.yml", "paths: [/a.log]\n"),
            ("c2.yml", "paths: [unclosed"),
            ("c3.conf", "paths: [/c.log]\n"),
            ("README", "not a config"),
        ]);
        let configs = store.enumerate_configs().unwrap();
        assert_eq!(configs.len(), 1);
        assert!(configs.contains_key("c1"));
    }

    #[test]
    fn test_enumerate_missing_directory() {
        let store = ConfigStore::new("/definitely/does/not/exist", "yml");
        assert!(matches!(
            store.enumerate_configs().unwrap_err(),
            Error::ReadDir { .. }
        ));
    }

    #[test]
    fn test_paths_claimed_by_others() {
        let (_dir, store) = store_with(&[
            ("a.yml", "paths: [/shared.log, /a.log]\n"),
            ("b.yml", "paths: [/shared.log, /b.log]\n"),
            ("c.yml", "paths: [/c.log]\n"),
        ]);
        let excluded = BTreeSet::from([id("c")]);
        let index = store.paths_claimed_by_others(&excluded).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index["/shared.log"], id("a"));
        assert_eq!(index["/b.log"], id("b"));
        assert!(!index.contains_key("/c.log"));
    }

    #[test]
    fn test_remove() {
        let (dir, store) = store_with(&[("c1.yml", "paths: []\n")]);
        store.remove(&id("c1")).unwrap();
        assert!(!dir.path().join("c1.yml").exists());
        assert!(store.remove(&id("c1")).unwrap_err().is_not_found());
    }
}
