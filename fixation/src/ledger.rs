//! Per-index version history.
//!
//! Each index maps to an immutable `Arc<Vec<Version>>`. Writers build a new
//! vector and swap it in under a short write lock, so readers holding an older
//! snapshot never observe a half-applied append or eviction.

use crate::backend::FixationBackend;
use crate::error::{FixationError, Result};
use crate::{LogicalIndex, Version};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

pub type History = Arc<Vec<Version>>;

pub struct VersionLedger {
    histories: RwLock<BTreeMap<LogicalIndex, History>>,
    backend: Option<Box<dyn FixationBackend>>,
    // serializes mutations; readers never take it
    gate: Mutex<()>,
}

impl Default for VersionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionLedger {
    pub fn new() -> Self {
        Self {
            histories: RwLock::new(BTreeMap::new()),
            backend: None,
            gate: Mutex::new(()),
        }
    }

    /// Ledger mirrored to `backend`, seeded with whatever it already holds.
    pub fn with_backend(backend: Box<dyn FixationBackend>) -> Result<Self> {
        let loaded = backend.load()?;
        let histories = loaded
            .into_iter()
            .map(|(index, versions)| (index, Arc::new(versions)))
            .collect();
        Ok(Self {
            histories: RwLock::new(histories),
            backend: Some(backend),
            gate: Mutex::new(()),
        })
    }

    pub(crate) fn from_histories(histories: BTreeMap<LogicalIndex, Vec<Version>>) -> Self {
        Self {
            histories: RwLock::new(
                histories
                    .into_iter()
                    .map(|(index, versions)| (index, Arc::new(versions)))
                    .collect(),
            ),
            backend: None,
            gate: Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<LogicalIndex, History>> {
        self.histories.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<LogicalIndex, History>> {
        self.histories.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, index: &LogicalIndex, versions: Vec<Version>) {
        self.write().insert(index.clone(), Arc::new(versions));
    }

    fn persist(&self, index: &LogicalIndex, puts: &[Version], removes: &[u64]) -> Result<()> {
        match &self.backend {
            Some(backend) => backend.apply(index, puts, removes),
            None => Ok(()),
        }
    }

    /// Immutable view of the retained versions of `index`.
    pub fn snapshot(&self, index: &LogicalIndex) -> Option<History> {
        self.read().get(index).cloned()
    }

    pub fn indexes(&self) -> Vec<LogicalIndex> {
        self.read().keys().cloned().collect()
    }

    /// Record `value` as effective from `block`.
    ///
    /// Returns the version that is latest afterwards. Writing the value that is
    /// already latest changes nothing. Writing twice at the same block keeps
    /// only the last value written.
    pub fn append(&self, index: &LogicalIndex, block: u64, value: Vec<u8>) -> Result<Version> {
        let _gate = self.lock_gate();
        let current = self.snapshot(index);
        let mut versions: Vec<Version> = current.as_deref().cloned().unwrap_or_default();

        let Some(last) = versions.last() else {
            let version = Version::new(block, value);
            self.persist(index, std::slice::from_ref(&version), &[])?;
            self.publish(index, vec![version.clone()]);
            debug!(%index, block, "first version recorded");
            return Ok(version);
        };

        if block < last.effective_block {
            warn!(%index, block, last = last.effective_block, "out of order write");
            return Err(FixationError::OutOfOrderWrite {
                index: index.clone(),
                block,
                last: last.effective_block,
            });
        }
        if last.value == value {
            return Ok(last.clone());
        }

        let mut puts = Vec::with_capacity(2);
        if block == last.effective_block {
            if last.is_pinned() {
                return Err(FixationError::VersionPinned {
                    index: index.clone(),
                    block,
                });
            }
            versions.pop();
            let reverts = versions
                .last()
                .is_some_and(|prev| prev.superseded_at == Some(block) && prev.value == value);
            if reverts {
                // same-block change undone: the previous version stays current
                if let Some(prev) = versions.last_mut() {
                    prev.superseded_at = None;
                }
                let prev = versions[versions.len() - 1].clone();
                self.persist(index, std::slice::from_ref(&prev), &[block])?;
                self.publish(index, versions);
                return Ok(prev);
            }
        } else if let Some(prev) = versions.last_mut() {
            prev.superseded_at = Some(block);
            puts.push(prev.clone());
        }

        let version = Version::new(block, value);
        puts.push(version.clone());
        self.persist(index, &puts, &[])?;
        versions.push(version.clone());
        self.publish(index, versions);
        debug!(%index, block, "version appended");
        Ok(version)
    }

    /// Version effective at `block`.
    pub fn lookup(&self, index: &LogicalIndex, block: u64) -> Result<Version> {
        let history = self
            .snapshot(index)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FixationError::UnknownIndex(index.clone()))?;
        resolve(index, &history, block).cloned()
    }

    pub fn latest(&self, index: &LogicalIndex) -> Result<Version> {
        self.snapshot(index)
            .and_then(|h| h.last().cloned())
            .ok_or_else(|| FixationError::UnknownIndex(index.clone()))
    }

    /// Retained versions in ascending block order.
    pub fn list_retained(&self, index: &LogicalIndex) -> Vec<Version> {
        self.snapshot(index)
            .map(|h| h.as_ref().clone())
            .unwrap_or_default()
    }

    pub fn oldest_retained(&self, index: &LogicalIndex) -> Option<u64> {
        self.snapshot(index)
            .and_then(|h| h.first().map(|v| v.effective_block))
    }

    /// Drop versions older than `before`, keeping the most recent of them and
    /// anything still pinned. Returns how many versions were removed.
    pub fn evict(&self, index: &LogicalIndex, before: u64) -> Result<usize> {
        let _gate = self.lock_gate();
        let Some(history) = self.snapshot(index) else {
            return Ok(0);
        };
        let below = history.partition_point(|v| v.effective_block < before);
        if below <= 1 {
            return Ok(0);
        }
        let anchor = below - 1;
        let mut kept = Vec::with_capacity(history.len());
        let mut evicted = Vec::new();
        for (pos, version) in history.iter().enumerate() {
            if pos >= anchor || version.is_pinned() {
                kept.push(version.clone());
            } else {
                evicted.push(version.effective_block);
            }
        }
        if evicted.is_empty() {
            return Ok(0);
        }
        self.persist(index, &[], &evicted)?;
        self.publish(index, kept);
        debug!(%index, before, evicted = evicted.len(), "evicted versions");
        Ok(evicted.len())
    }

    /// Add a holder to the version effective at `block`.
    pub fn pin(&self, index: &LogicalIndex, block: u64) -> Result<Version> {
        let _gate = self.lock_gate();
        let history = self
            .snapshot(index)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FixationError::UnknownIndex(index.clone()))?;
        let target = resolve(index, &history, block)?.effective_block;
        self.adjust_ref_count(index, &history, target, |count| Some(count.saturating_add(1)))
    }

    /// Release one holder of the version that became effective at `effective_block`.
    pub fn unpin(&self, index: &LogicalIndex, effective_block: u64) -> Result<Version> {
        let _gate = self.lock_gate();
        let history = self
            .snapshot(index)
            .ok_or_else(|| FixationError::UnknownIndex(index.clone()))?;
        self.adjust_ref_count(index, &history, effective_block, |count| {
            count.checked_sub(1)
        })
    }

    fn adjust_ref_count(
        &self,
        index: &LogicalIndex,
        history: &[Version],
        effective_block: u64,
        adjust: impl FnOnce(u32) -> Option<u32>,
    ) -> Result<Version> {
        let not_pinned = || FixationError::NotPinned {
            index: index.clone(),
            block: effective_block,
        };
        let pos = history
            .binary_search_by_key(&effective_block, |v| v.effective_block)
            .map_err(|_| not_pinned())?;
        let mut versions = history.to_vec();
        let version = &mut versions[pos];
        version.ref_count = adjust(version.ref_count).ok_or_else(not_pinned)?;
        let updated = version.clone();
        self.persist(index, std::slice::from_ref(&updated), &[])?;
        self.publish(index, versions);
        Ok(updated)
    }

    /// Sum of ref counts over every retained version.
    pub fn outstanding_pins(&self) -> u64 {
        self.read()
            .values()
            .flat_map(|h| h.iter())
            .map(|v| u64::from(v.ref_count))
            .sum()
    }

    pub(crate) fn persist_watermark(&self, watermark: u64) -> Result<()> {
        match &self.backend {
            Some(backend) => backend.save_watermark(watermark),
            None => Ok(()),
        }
    }

    pub(crate) fn stored_watermark(&self) -> Result<Option<u64>> {
        match &self.backend {
            Some(backend) => backend.load_watermark(),
            None => Ok(None),
        }
    }

    pub fn flush(&self) -> Result<()> {
        match &self.backend {
            Some(backend) => backend.flush(),
            None => Ok(()),
        }
    }
}

pub(crate) fn resolve<'h>(
    index: &LogicalIndex,
    history: &'h [Version],
    block: u64,
) -> Result<&'h Version> {
    let not_retained = || FixationError::ValueNotRetained {
        index: index.clone(),
        block,
        earliest: history.first().map_or(0, |v| v.effective_block),
    };
    let pos = history.partition_point(|v| v.effective_block <= block);
    if pos == 0 {
        return Err(not_retained());
    }
    let version = &history[pos - 1];
    if !version.covers(block) {
        return Err(not_retained());
    }
    Ok(version)
}
