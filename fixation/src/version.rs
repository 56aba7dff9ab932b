use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable name of one tracked parameter instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalIndex(String);

impl LogicalIndex {
    pub fn new(name: impl Into<String>) -> Self {
        LogicalIndex(name.into())
    }

    /// Index for `key` owned by module `scope`, rendered as `scope/key`.
    pub fn scoped(scope: &str, key: &str) -> Self {
        LogicalIndex(format!("{scope}/{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalIndex {
    fn from(value: &str) -> Self {
        LogicalIndex::new(value)
    }
}

impl From<String> for LogicalIndex {
    fn from(value: String) -> Self {
        LogicalIndex(value)
    }
}

/// One effective value of a logical index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub effective_block: u64,
    pub value: Vec<u8>,
    #[serde(default)]
    pub ref_count: u32,
    /// Effective block of the version appended after this one.
    #[serde(default)]
    pub superseded_at: Option<u64>,
}

impl Version {
    pub fn new(effective_block: u64, value: Vec<u8>) -> Self {
        Self {
            effective_block,
            value,
            ref_count: 0,
            superseded_at: None,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.ref_count > 0
    }

    /// Whether this version was the effective one at `block`.
    pub fn covers(&self, block: u64) -> bool {
        block >= self.effective_block && self.superseded_at.map_or(true, |end| block < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_index_joins_scope_and_key() {
        let idx = LogicalIndex::scoped("pairing", "ServicersToPairCount");
        assert_eq!(idx.as_str(), "pairing/ServicersToPairCount");
        assert_eq!(idx.to_string(), "pairing/ServicersToPairCount");
    }

    #[test]
    fn coverage_ends_at_successor() {
        let mut v = Version::new(10, vec![1]);
        assert!(!v.covers(9));
        assert!(v.covers(10));
        assert!(v.covers(u64::MAX));
        v.superseded_at = Some(15);
        assert!(v.covers(14));
        assert!(!v.covers(15));
    }
}
