//! On-disk layout of ledger entries.
//!
//! Each logical index owns one ordered collection named `fixation/<index>`.
//! Keys are the effective block in big-endian so that byte order matches block
//! order; values carry the remaining fields of the version.

use crate::error::{FixationError, Result};
use crate::{LogicalIndex, Version};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const TREE_PREFIX: &str = "fixation/";
/// Store-wide metadata; its name sits outside [`TREE_PREFIX`].
pub const META_TREE: &str = "fixation_meta";
pub const WATERMARK_KEY: &[u8] = b"watermark";

#[derive(Debug, Serialize, Deserialize)]
struct StoredVersion {
    value: Vec<u8>,
    ref_count: u32,
    superseded_at: Option<u64>,
}

pub(crate) fn ser<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| FixationError::Codec(format!("ser: {e}")))
}

pub(crate) fn de<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| FixationError::Codec(format!("de: {e}")))
}

pub fn tree_name(index: &LogicalIndex) -> String {
    format!("{TREE_PREFIX}{index}")
}

/// Recover the logical index from a tree name, if the tree belongs to us.
pub fn index_from_tree(name: &[u8]) -> Option<LogicalIndex> {
    let name = std::str::from_utf8(name).ok()?;
    name.strip_prefix(TREE_PREFIX).map(LogicalIndex::new)
}

pub fn block_key(block: u64) -> [u8; 8] {
    block.to_be_bytes()
}

pub fn decode_block_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| FixationError::Codec(format!("block key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

pub fn encode_version(version: &Version) -> Result<Vec<u8>> {
    ser(&StoredVersion {
        value: version.value.clone(),
        ref_count: version.ref_count,
        superseded_at: version.superseded_at,
    })
}

pub fn decode_version(key: &[u8], bytes: &[u8]) -> Result<Version> {
    let stored: StoredVersion = de(bytes)?;
    Ok(Version {
        effective_block: decode_block_key(key)?,
        value: stored.value,
        ref_count: stored.ref_count,
        superseded_at: stored.superseded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_keys_sort_like_blocks() {
        let mut keys = vec![block_key(300), block_key(2), block_key(1 << 40), block_key(0)];
        keys.sort();
        let blocks: Vec<u64> = keys.iter().map(|k| decode_block_key(k).unwrap()).collect();
        assert_eq!(blocks, vec![0, 2, 300, 1 << 40]);
    }

    #[test]
    fn tree_names_round_trip_through_index() {
        let idx = LogicalIndex::scoped("pairing", "ServicersToPairCount");
        let name = tree_name(&idx);
        assert_eq!(index_from_tree(name.as_bytes()), Some(idx));
        assert_eq!(index_from_tree(b"__sled__default"), None);
    }

    #[test]
    fn short_key_is_rejected() {
        assert!(matches!(decode_block_key(&[1, 2, 3]), Err(FixationError::Codec(_))));
    }

    #[test]
    fn version_record_keeps_pins_and_successor() {
        let mut v = Version::new(42, b"payload".to_vec());
        v.ref_count = 3;
        v.superseded_at = Some(50);
        let bytes = encode_version(&v).unwrap();
        let back = decode_version(&block_key(42), &bytes).unwrap();
        assert_eq!(back, v);
    }
}
