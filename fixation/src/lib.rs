//! Point-in-time history of governance parameters.
//!
//! Every change of a tracked parameter becomes a [`Version`] effective from
//! the block that wrote it. Versions stay resident while any block inside the
//! retention window (a fixed number of epochs) may still ask for them, and are
//! pruned deterministically at epoch starts once superseded and out of range.
#![forbid(unsafe_code)]

pub mod backend;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod hooks;
pub mod ledger;
pub mod retention;
pub mod snapshot;
pub mod store;
pub mod value;
mod version;

pub use backend::{FixationBackend, SledBackend};
pub use clock::{EpochClock, EpochHistory, EpochListener, EpochLog};
pub use config::{FixationConfig, RetentionConfig};
pub use error::{FixationError, Result};
pub use hooks::{apply_param_changes, ParamChange, ValueChangeSink};
pub use ledger::VersionLedger;
pub use retention::{RetentionManager, RetentionReport};
pub use snapshot::{FixationSnapshot, IndexSnapshot};
pub use store::{FixationStore, PinnedVersion};
pub use value::{BinaryCodec, TypedParam, ValueCodec};
pub use version::{LogicalIndex, Version};
