//! Export and import of the full retained state, for migration and audits.

use crate::config::RetentionConfig;
use crate::error::{FixationError, Result};
use crate::ledger::VersionLedger;
use crate::store::FixationStore;
use crate::{LogicalIndex, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub index: LogicalIndex,
    pub versions: Vec<Version>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixationSnapshot {
    pub watermark: u64,
    pub indexes: Vec<IndexSnapshot>,
}

impl FixationSnapshot {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| FixationError::Codec(format!("json: {e}")))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| FixationError::Codec(format!("json: {e}")))
    }
}

fn check_history(index: &LogicalIndex, versions: &[Version]) -> Result<()> {
    for pair in versions.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.effective_block <= prev.effective_block {
            return Err(FixationError::OutOfOrderWrite {
                index: index.clone(),
                block: next.effective_block,
                last: prev.effective_block,
            });
        }
        if next.value == prev.value && prev.superseded_at == Some(next.effective_block) {
            return Err(FixationError::Codec(format!(
                "{index}: redundant version at block {}",
                next.effective_block
            )));
        }
    }
    Ok(())
}

impl FixationStore {
    pub fn export(&self) -> FixationSnapshot {
        let ledger = self.ledger();
        FixationSnapshot {
            watermark: self.watermark(),
            indexes: ledger
                .indexes()
                .into_iter()
                .map(|index| IndexSnapshot {
                    versions: ledger.list_retained(&index),
                    index,
                })
                .collect(),
        }
    }

    /// In-memory store rebuilt from `snapshot`.
    pub fn import(config: RetentionConfig, snapshot: FixationSnapshot) -> Result<Self> {
        let mut histories = BTreeMap::new();
        for IndexSnapshot { index, versions } in snapshot.indexes {
            check_history(&index, &versions)?;
            if versions.is_empty() {
                continue;
            }
            if histories.insert(index.clone(), versions).is_some() {
                return Err(FixationError::Codec(format!("{index}: listed twice")));
            }
        }
        let store = Self::from_parts(config, VersionLedger::from_histories(histories))?;
        store.retention().restore_watermark(snapshot.watermark);
        Ok(store)
    }
}
