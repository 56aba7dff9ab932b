use crate::codec::{
    block_key, de, decode_version, encode_version, index_from_tree, ser, tree_name, META_TREE,
    WATERMARK_KEY,
};
use crate::error::Result;
use crate::{LogicalIndex, Version};
use std::collections::BTreeMap;
use std::path::Path;

/// Ordered key-value substrate that mirrors the ledger.
pub trait FixationBackend: Send + Sync {
    /// Write `puts` and drop the versions keyed by `removes` as one atomic
    /// step: either all of it lands or none of it does.
    fn apply(&self, index: &LogicalIndex, puts: &[Version], removes: &[u64]) -> Result<()>;
    /// Every stored index with its versions in ascending block order.
    fn load(&self) -> Result<BTreeMap<LogicalIndex, Vec<Version>>>;
    fn save_watermark(&self, _watermark: u64) -> Result<()> {
        Ok(())
    }
    fn load_watermark(&self) -> Result<Option<u64>> {
        Ok(None)
    }
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn put(&self, index: &LogicalIndex, version: &Version) -> Result<()> {
        self.apply(index, std::slice::from_ref(version), &[])
    }

    fn remove(&self, index: &LogicalIndex, effective_block: u64) -> Result<()> {
        self.apply(index, &[], &[effective_block])
    }
}

pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::Config::new().path(path.as_ref()).open()?;
        Ok(Self { db })
    }

    fn tree(&self, index: &LogicalIndex) -> Result<sled::Tree> {
        Ok(self.db.open_tree(tree_name(index))?)
    }

    /// Stored version with the greatest effective block not above `block`,
    /// read straight from disk. Audit helper for checking what a store has
    /// persisted; the ledger itself always answers from memory.
    pub fn version_at(&self, index: &LogicalIndex, block: u64) -> Result<Option<Version>> {
        let tree = self.tree(index)?;
        match tree.range(..=block_key(block)).next_back() {
            Some(item) => {
                let (k, v) = item?;
                Ok(Some(decode_version(&k, &v)?))
            }
            None => Ok(None),
        }
    }
}

impl FixationBackend for SledBackend {
    fn apply(&self, index: &LogicalIndex, puts: &[Version], removes: &[u64]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for block in removes {
            batch.remove(block_key(*block).to_vec());
        }
        for version in puts {
            batch.insert(block_key(version.effective_block).to_vec(), encode_version(version)?);
        }
        self.tree(index)?.apply_batch(batch)?;
        Ok(())
    }

    fn load(&self) -> Result<BTreeMap<LogicalIndex, Vec<Version>>> {
        let mut out = BTreeMap::new();
        for name in self.db.tree_names() {
            let Some(index) = index_from_tree(&name) else {
                continue;
            };
            let tree = self.db.open_tree(&name)?;
            let mut versions = Vec::new();
            for item in tree.iter() {
                let (k, v) = item?;
                versions.push(decode_version(&k, &v)?);
            }
            if !versions.is_empty() {
                out.insert(index, versions);
            }
        }
        Ok(out)
    }

    fn save_watermark(&self, watermark: u64) -> Result<()> {
        self.db
            .open_tree(META_TREE)?
            .insert(WATERMARK_KEY, ser(&watermark)?)?;
        Ok(())
    }

    fn load_watermark(&self) -> Result<Option<u64>> {
        match self.db.open_tree(META_TREE)?.get(WATERMARK_KEY)? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
