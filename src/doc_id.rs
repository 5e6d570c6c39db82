use std::str::FromStr;

use crate::error::{Error, Result};

/// Width of the zero-padded directory name holding a document's files.
const DIR_NAME_WIDTH: usize = 10;

/// A document identifier.
///
/// Ids are allocated in strictly increasing order and never reused, even
/// after the document they named has been deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(u64);

impl DocId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id that follows this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Name of the per-document directory under the root, e.g. `0000000042`.
    pub fn dir_name(self) -> String {
        format!("{:0width$}", self.0, width = DIR_NAME_WIDTH)
    }

    /// Parse a per-document directory name.
    ///
    /// Only all-digit names qualify; anything else is not a document
    /// directory and yields `None`.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        name.parse().ok().map(Self)
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id:{}", self.0)
    }
}

impl FromStr for DocId {
    type Err = Error;

    /// Accepts both `id:42` and a bare `42`.
    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("id:").unwrap_or(s);
        digits.parse().map(Self).map_err(|_| Error::NotFound {
            kind: "document",
            name: s.to_string(),
        })
    }
}
