//! Deterministic block and epoch clock.
//!
//! The chain owns the real clock; this module defines the boundary it must
//! offer ([`EpochHistory`], [`EpochListener`]) and a reference driver used by
//! simulations and tests.

use crate::error::Result;

/// Observed epoch starts, walked backwards.
pub trait EpochHistory {
    /// Epoch starts at or before `block`, most recent first.
    fn epoch_starts_back_from(&self, block: u64) -> Box<dyn Iterator<Item = u64> + '_>;
}

/// Receives clock signals in block order.
pub trait EpochListener {
    fn on_block(&self, _block: u64) {}

    /// Called when `block` starts a new epoch. Returns the watermark in force
    /// afterwards; history older than it may be discarded.
    fn on_epoch_start(&self, block: u64, history: &dyn EpochHistory) -> Result<u64>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpochLog {
    starts: Vec<u64>,
}

impl EpochLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts must be recorded in increasing order; stale ones are ignored.
    pub fn record(&mut self, start: u64) {
        if self.starts.last().map_or(true, |last| start > *last) {
            self.starts.push(start);
        }
    }

    /// Forget starts older than `block`, keeping the one `block` falls in.
    pub fn prune_before(&mut self, block: u64) {
        let keep_from = self.starts.partition_point(|s| *s <= block).saturating_sub(1);
        self.starts.drain(..keep_from);
    }

    pub fn starts(&self) -> &[u64] {
        &self.starts
    }

    pub fn latest(&self) -> Option<u64> {
        self.starts.last().copied()
    }
}

impl EpochHistory for EpochLog {
    fn epoch_starts_back_from(&self, block: u64) -> Box<dyn Iterator<Item = u64> + '_> {
        let end = self.starts.partition_point(|s| *s <= block);
        Box::new(self.starts[..end].iter().rev().copied())
    }
}

/// Reference clock: block 0 opens epoch 0 and a new epoch opens every
/// `blocks_per_epoch` blocks. Changing the epoch length takes effect at the
/// next epoch start.
#[derive(Debug, Clone)]
pub struct EpochClock {
    block: u64,
    blocks_per_epoch: u64,
    pending_blocks_per_epoch: Option<u64>,
    log: EpochLog,
}

impl EpochClock {
    /// Clock sitting at genesis. `blocks_per_epoch` is clamped to at least 1.
    pub fn new(blocks_per_epoch: u64) -> Self {
        let mut log = EpochLog::new();
        log.record(0);
        Self {
            block: 0,
            blocks_per_epoch: blocks_per_epoch.max(1),
            pending_blocks_per_epoch: None,
            log,
        }
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn blocks_per_epoch(&self) -> u64 {
        self.blocks_per_epoch
    }

    pub fn current_epoch_start(&self) -> u64 {
        self.log.latest().unwrap_or(0)
    }

    pub fn history(&self) -> &EpochLog {
        &self.log
    }

    pub fn set_blocks_per_epoch(&mut self, blocks_per_epoch: u64) {
        self.pending_blocks_per_epoch = Some(blocks_per_epoch.max(1));
    }

    /// Step one block. Returns true when the new block starts an epoch.
    fn tick(&mut self) -> bool {
        self.block += 1;
        if self.block - self.current_epoch_start() < self.blocks_per_epoch {
            return false;
        }
        if let Some(next) = self.pending_blocks_per_epoch.take() {
            self.blocks_per_epoch = next;
        }
        self.log.record(self.block);
        true
    }

    /// Advance to `target`, signalling every block and epoch start on the way.
    pub fn advance_to(&mut self, target: u64, listener: &dyn EpochListener) -> Result<()> {
        while self.block < target {
            let epoch_start = self.tick();
            listener.on_block(self.block);
            if epoch_start {
                let watermark = listener.on_epoch_start(self.block, &self.log)?;
                self.log.prune_before(watermark);
            }
        }
        Ok(())
    }
}
