use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// The maximum allowed length for an [`EntityID`].
const ENTITY_ID_MAX_LEN: usize = 255;

/// A validated identifier of a log-producing unit, e.g., a container.
///
/// The identifier doubles as the stem of the entity's config file name, so it
/// must be non-empty and must not contain path separators.
///
/// # Examples
///
/// ```
/// # use log_pilot::entity::EntityID;
/// let id = EntityID::new("c1f0c84cf87d").unwrap();
/// assert_eq!(id.as_ref(), "c1f0c84cf87d");
/// assert!(EntityID::new("../etc/passwd").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityID(Arc<str>);

impl EntityID {
    /// Creates a new `EntityID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntityID`] if the input is empty, longer than
    /// [`ENTITY_ID_MAX_LEN`], contains a `/` or a NUL byte, or is one of the
    /// relative directory names `.` and `..`.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty()
            || src.len() > ENTITY_ID_MAX_LEN
            || src == "."
            || src == ".."
            || src.contains(['/', '\0'])
        {
            return Err(Error::InvalidEntityID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

impl FromStr for EntityID {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for EntityID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
