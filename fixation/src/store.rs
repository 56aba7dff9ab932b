use crate::backend::{FixationBackend, SledBackend};
use crate::clock::{EpochHistory, EpochListener};
use crate::config::{FixationConfig, RetentionConfig};
use crate::error::{FixationError, Result};
use crate::ledger::VersionLedger;
use crate::retention::{RetentionManager, RetentionReport};
use crate::{LogicalIndex, Version};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Proof that a historical version is held resident. Hand it back to
/// [`FixationStore::unpin`] once the computation using it is done.
#[must_use = "a pin that is never released keeps its version resident"]
#[derive(Debug, PartialEq, Eq)]
pub struct PinnedVersion {
    index: LogicalIndex,
    effective_block: u64,
}

impl PinnedVersion {
    pub fn index(&self) -> &LogicalIndex {
        &self.index
    }

    pub fn effective_block(&self) -> u64 {
        self.effective_block
    }
}

/// Point-in-time parameter store.
///
/// Writes (values, pins, retention passes) are serialized; reads resolve
/// against an immutable per-index snapshot and never wait on a writer.
pub struct FixationStore {
    ledger: VersionLedger,
    retention: RetentionManager,
    // highest block any write or clock signal has reached
    head: Mutex<Option<u64>>,
}

impl FixationStore {
    /// In-memory store.
    pub fn new(config: RetentionConfig) -> Result<Self> {
        Self::from_parts(config, VersionLedger::new())
    }

    /// Store persisted in a sled database at `path`.
    pub fn open(path: impl AsRef<Path>, config: RetentionConfig) -> Result<Self> {
        let backend = SledBackend::open(path.as_ref())?;
        Self::with_backend(config, Box::new(backend))
    }

    pub fn with_backend(config: RetentionConfig, backend: Box<dyn FixationBackend>) -> Result<Self> {
        let retention = RetentionManager::new(config)?;
        let ledger = VersionLedger::with_backend(backend)?;
        if let Some(watermark) = ledger.stored_watermark()? {
            retention.restore_watermark(watermark);
        }
        let store = Self::assemble(retention, ledger);
        info!(
            indexes = store.ledger.indexes().len(),
            watermark = store.watermark(),
            "fixation store opened"
        );
        Ok(store)
    }

    pub fn from_config(config: &FixationConfig) -> Result<Self> {
        match &config.db_path {
            Some(path) => Self::open(path, config.retention),
            None => Self::new(config.retention),
        }
    }

    pub(crate) fn from_parts(config: RetentionConfig, ledger: VersionLedger) -> Result<Self> {
        let retention = RetentionManager::new(config)?;
        Ok(Self::assemble(retention, ledger))
    }

    fn assemble(retention: RetentionManager, ledger: VersionLedger) -> Self {
        let head = ledger
            .indexes()
            .iter()
            .filter_map(|idx| ledger.snapshot(idx))
            .filter_map(|h| h.last().map(|v| v.effective_block))
            .max();
        Self {
            ledger,
            retention,
            head: Mutex::new(head),
        }
    }

    fn lock_head(&self) -> MutexGuard<'_, Option<u64>> {
        self.head.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `value` effective for `index` from `current_block` on.
    ///
    /// `current_block` must be the block being executed; anything below the
    /// highest block already seen is rejected.
    pub fn set_value(
        &self,
        index: &LogicalIndex,
        current_block: u64,
        value: impl Into<Vec<u8>>,
    ) -> Result<Version> {
        let mut head = self.lock_head();
        if let Some(last) = *head {
            if current_block < last {
                warn!(%index, block = current_block, last, "write behind current block");
                return Err(FixationError::OutOfOrderWrite {
                    index: index.clone(),
                    block: current_block,
                    last,
                });
            }
        }
        let version = self.ledger.append(index, current_block, value.into())?;
        *head = Some(current_block);
        Ok(version)
    }

    pub fn get_value_at(&self, index: &LogicalIndex, block: u64) -> Result<Vec<u8>> {
        self.ledger.lookup(index, block).map(|v| v.value)
    }

    pub fn get_current_value(&self, index: &LogicalIndex) -> Result<Vec<u8>> {
        self.ledger.latest(index).map(|v| v.value)
    }

    /// Full version record effective at `block`.
    pub fn version_at(&self, index: &LogicalIndex, block: u64) -> Result<Version> {
        self.ledger.lookup(index, block)
    }

    pub fn list_versions(&self, index: &LogicalIndex) -> Vec<Version> {
        self.ledger.list_retained(index)
    }

    pub fn list_indexes(&self) -> Vec<LogicalIndex> {
        self.ledger.indexes()
    }

    /// Any block below this is unanswerable for every index.
    pub fn earliest_retained_block(&self) -> u64 {
        self.ledger
            .indexes()
            .iter()
            .filter_map(|idx| self.ledger.oldest_retained(idx))
            .fold(self.retention.watermark(), u64::min)
    }

    /// Oldest block still answerable for `index`.
    pub fn earliest_retained_block_for(&self, index: &LogicalIndex) -> Result<u64> {
        self.ledger
            .oldest_retained(index)
            .ok_or_else(|| FixationError::UnknownIndex(index.clone()))
    }

    /// Keep the version effective at `block` resident until unpinned.
    pub fn pin(&self, index: &LogicalIndex, block: u64) -> Result<PinnedVersion> {
        let version = self.ledger.pin(index, block)?;
        Ok(PinnedVersion {
            index: index.clone(),
            effective_block: version.effective_block,
        })
    }

    /// Release a pin. The version becomes evictable at the next epoch start.
    pub fn unpin(&self, pin: PinnedVersion) -> Result<()> {
        self.ledger.unpin(&pin.index, pin.effective_block)?;
        Ok(())
    }

    pub fn outstanding_pins(&self) -> u64 {
        self.ledger.outstanding_pins()
    }

    pub fn retention_config(&self) -> RetentionConfig {
        self.retention.config()
    }

    pub fn set_retention_config(&self, config: RetentionConfig) -> Result<()> {
        self.retention.set_config(config)
    }

    pub fn watermark(&self) -> u64 {
        self.retention.watermark()
    }

    /// Record that the chain reached `block`.
    pub fn note_block(&self, block: u64) {
        let mut head = self.lock_head();
        if head.map_or(true, |last| block > last) {
            *head = Some(block);
        }
    }

    /// Retention pass for the epoch starting at `block`.
    pub fn run_retention(&self, block: u64, history: &dyn EpochHistory) -> Result<RetentionReport> {
        let _head = self.lock_head();
        self.retention
            .run(&self.ledger, block, history.epoch_starts_back_from(block))
    }

    pub fn flush(&self) -> Result<()> {
        self.ledger.flush()
    }

    pub(crate) fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    pub(crate) fn retention(&self) -> &RetentionManager {
        &self.retention
    }
}

impl EpochListener for FixationStore {
    fn on_block(&self, block: u64) {
        self.note_block(block);
    }

    fn on_epoch_start(&self, block: u64, history: &dyn EpochHistory) -> Result<u64> {
        self.note_block(block);
        self.run_retention(block, history).map(|r| r.watermark)
    }
}
