use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use super::{Error, Result};
use crate::fsutil;

/// Device and inode pair the agent uses to recognise a file across renames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
pub struct FileIdentity {
    #[serde(default)]
    pub inode: u64,
    #[serde(default)]
    pub device: u64,
}

/// The agent's last-known read position for one source file.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RegistryRecord {
    pub source: PathBuf,
    pub offset: i64,
    #[serde(default)]
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Time to live in nanoseconds; negative values mean "no expiry".
    #[serde(default)]
    pub ttl: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "FileStateOS", default)]
    pub file_identity: FileIdentity,
}

impl RegistryRecord {
    /// Returns the record's time to live, or `None` if it never expires.
    pub fn ttl(&self) -> Option<Duration> {
        u64::try_from(self.ttl).ok().map(Duration::from_nanos)
    }

    /// Returns true if the agent has not yet read up to `size` bytes.
    ///
    /// A negative offset is never a valid position and counts as unread.
    pub fn is_behind(&self, size: u64) -> bool {
        u64::try_from(self.offset).map_or(true, |offset| offset < size)
    }
}

/// Immutable snapshot of the registry keyed by source path.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    records: HashMap<PathBuf, RegistryRecord>,
}

impl Registry {
    /// Folds raw records into a snapshot.
    ///
    /// The registry may hold several records for the same source; the first one
    /// in file order is kept and later duplicates are ignored. This is a fixed
    /// choice, not a recency rule.
    pub fn from_records(records: impl IntoIterator<Item = RegistryRecord>) -> Self {
        let mut map = HashMap::new();
        for record in records {
            match map.entry(record.source.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(record);
                }
                Entry::Occupied(entry) => {
                    log::trace!(
                        "ignoring duplicate registry record: source={}, offset={}",
                        entry.key().display(),
                        record.offset
                    );
                }
            }
        }
        Self { records: map }
    }

    pub fn get(&self, source: impl AsRef<Path>) -> Option<&RegistryRecord> {
        self.records.get(source.as_ref())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads and parses the registry file at `path`.
///
/// # Errors
///
/// - [`Error::Open`] if the file cannot be opened.
/// - [`Error::Parse`] if the content is not a JSON array of registry records.
///
/// Callers must treat either error as "unknown state" and must not delete anything
/// based on it.
pub fn read_registry(path: impl AsRef<Path>) -> Result<Registry> {
    let path = path.as_ref();
    let reader = fsutil::open_file_reader(path)?;
    read_registry_from_reader(reader, path)
}

fn read_registry_from_reader<R: Read>(reader: R, origin: &Path) -> Result<Registry> {
    let records: Vec<RegistryRecord> =
        serde_json::from_reader(reader).map_err(|source| Error::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
    let registry = Registry::from_records(records);
    log::trace!(
        "read {} registry records from `{}`",
        registry.len(),
        origin.display()
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const SAMPLE: &str = r#"[
  {"source":"/var/lib/docker/containers/c1/c1-json.log","offset":100,"timestamp":"2019-05-02T10:44:16.123456789+08:00","ttl":-1,"type":"log","FileStateOS":{"inode":1234,"device":2049}},
  {"source":"/data/app/out.log","offset":50,"timestamp":"2019-05-02T10:44:17Z","ttl":3600000000000,"type":"log","FileStateOS":{"inode":99,"device":2049}},
  {"source":"/data/app/out.log","offset":500,"timestamp":"2019-05-02T10:50:00Z","ttl":-1,"type":"log","FileStateOS":{"inode":99,"device":2049}}
]"#;

    fn parse(contents: &str) -> Result<Registry> {
        read_registry_from_reader(Cursor::new(contents.as_bytes()), Path::new("/dummy"))
    }

    #[test]
    fn test_parse_records() {
        let registry = parse(SAMPLE).unwrap();
        assert_eq!(registry.len(), 2);

        let record = registry
            .get("/var/lib/docker/containers/c1/c1-json.log")
            .unwrap();
        assert_eq!(record.offset, 100);
        assert_eq!(record.kind, "log");
        assert_eq!(
            record.file_identity,
            FileIdentity {
                inode: 1234,
                device: 2049
            }
        );
        assert_eq!(record.ttl(), None);
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn test_first_record_wins() {
        let registry = parse(SAMPLE).unwrap();
        let record = registry.get("/data/app/out.log").unwrap();
        assert_eq!(record.offset, 50);
        assert_eq!(record.ttl(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_missing_optional_fields() {
        let registry = parse(r#"[{"source":"/a.log","offset":7}]"#).unwrap();
        let record = registry.get("/a.log").unwrap();
        assert_eq!(record.file_identity, FileIdentity::default());
        assert_eq!(record.timestamp, None);
    }

    #[test]
    fn test_is_behind() {
        let registry = parse(r#"[{"source":"/a.log","offset":100},{"source":"/b.log","offset":-1}]"#)
            .unwrap();
        let a = registry.get("/a.log").unwrap();
        assert!(a.is_behind(101));
        assert!(!a.is_behind(100));
        assert!(!a.is_behind(10));
        assert!(registry.get("/b.log").unwrap().is_behind(0));
    }

    #[test]
    fn test_parse_error() {
        let err = parse(r#"{"source":"/a.log"}"#).unwrap_err();
        match err {
            Error::Parse { path, .. } => assert_eq!(path, PathBuf::from("/dummy")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_registry_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "{SAMPLE}").unwrap();
        tmp.flush().unwrap();
        let registry = read_registry(tmp.path()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_read_registry_missing_file() {
        let err = read_registry("/definitely/does/not/exist").unwrap_err();
        assert!(matches!(err, Error::Open(_)));
    }
}
