use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DataError;

/// Number of leading characters that identify a speaker family.
pub const FAMILY_LEN: usize = 3;

/// Identity of a speaker or of a single recording of a speaker.
///
/// Two comparisons are available:
/// - `==` is exact identity of the raw id.
/// - [`SpeakerKey::is_same_speaker`] compares speaker families, i.e. the
///   first [`FAMILY_LEN`] characters. `"225_01"` and `"225_07"` are the same
///   speaker, `"225_01"` and `"240_01"` are not.
///
/// A key shorter than [`FAMILY_LEN`] characters is its own family, so family
/// matching degrades to exact matching for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpeakerKey(String);

impl SpeakerKey {
    /// Creates a key. Fails if `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, DataError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DataError::EmptyKey);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the family prefix of this key.
    pub fn family(&self) -> &str {
        match self.0.char_indices().nth(FAMILY_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// Reports whether both keys belong to the same speaker family.
    pub fn is_same_speaker(&self, other: &SpeakerKey) -> bool {
        self.family() == other.family()
    }
}

impl fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SpeakerKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for SpeakerKey {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SpeakerKey {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SpeakerKey {
    type Error = DataError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpeakerKey> for String {
    fn from(key: SpeakerKey) -> Self {
        key.0
    }
}
