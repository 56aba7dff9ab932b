use crate::config::RetentionConfig;
use crate::error::{FixationError, Result};
use crate::ledger::VersionLedger;
use std::sync::RwLock;
use tracing::{debug, error, info};

/// Outcome of one retention pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub block: u64,
    pub watermark: u64,
    pub evicted: usize,
}

#[derive(Debug, Clone, Copy)]
struct RetentionState {
    config: RetentionConfig,
    watermark: u64,
}

pub struct RetentionManager {
    state: RwLock<RetentionState>,
}

impl RetentionManager {
    pub fn new(config: RetentionConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            error!(error = %err, "rejecting retention config");
            return Err(err);
        }
        Ok(Self {
            state: RwLock::new(RetentionState {
                config,
                watermark: 0,
            }),
        })
    }

    fn current(&self) -> RetentionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> RetentionConfig {
        self.current().config
    }

    /// Replace the retention policy. Data already evicted stays evicted.
    pub fn set_config(&self, config: RetentionConfig) -> Result<()> {
        if let Err(err) = config.validate() {
            error!(error = %err, "rejecting retention config");
            return Err(err);
        }
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        info!(
            blocks_per_epoch = config.blocks_per_epoch,
            epochs_to_save = config.epochs_to_save,
            "retention config updated"
        );
        state.config = config;
        Ok(())
    }

    /// Watermark computed by the most recent pass.
    pub fn watermark(&self) -> u64 {
        self.current().watermark
    }

    pub(crate) fn restore_watermark(&self, watermark: u64) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.watermark = watermark;
    }

    /// Earliest epoch start still inside the window ending at `block`.
    ///
    /// `epoch_starts` walks observed epoch starts from the most recent one
    /// backwards. The walk stops at the first start lying a full window or
    /// more behind `block`; the start after it is the watermark. The current
    /// epoch start is never passed over, and an exhausted history yields the
    /// oldest start seen.
    pub fn compute_watermark<I>(&self, block: u64, epoch_starts: I) -> Result<u64>
    where
        I: IntoIterator<Item = u64>,
    {
        let window = self.config().window()?;
        let mut previous: Option<u64> = None;
        let mut watermark: Option<u64> = None;
        for start in epoch_starts {
            if let Some(prev) = previous {
                if start >= prev {
                    return Err(FixationError::EpochHistoryOutOfOrder {
                        previous: prev,
                        next: start,
                    });
                }
            }
            previous = Some(start);
            if start > block {
                continue;
            }
            if block - start >= window && watermark.is_some() {
                break;
            }
            watermark = Some(start);
            if block - start >= window {
                break;
            }
        }
        Ok(watermark.unwrap_or(0))
    }

    /// Recompute the watermark at `block` and evict every index against it.
    pub fn run<I>(&self, ledger: &VersionLedger, block: u64, epoch_starts: I) -> Result<RetentionReport>
    where
        I: IntoIterator<Item = u64>,
    {
        let watermark = self.compute_watermark(block, epoch_starts)?;
        // stored ahead of eviction: disk may hold a newer watermark than its
        // evictions, never an older one
        ledger.persist_watermark(watermark)?;
        self.restore_watermark(watermark);
        let mut evicted = 0;
        for index in ledger.indexes() {
            let removed = ledger.evict(&index, watermark)?;
            if removed > 0 {
                debug!(%index, removed, watermark, "index pruned");
            }
            evicted += removed;
        }
        info!(block, watermark, evicted, "retention pass complete");
        Ok(RetentionReport {
            block,
            watermark,
            evicted,
        })
    }
}
