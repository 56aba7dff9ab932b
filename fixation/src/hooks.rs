use crate::error::Result;
use crate::store::FixationStore;
use crate::LogicalIndex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Target of parameter-change notifications from governance.
pub trait ValueChangeSink {
    fn on_value_changed(&self, index: &LogicalIndex, block: u64, new_value: &[u8]) -> Result<()>;
}

impl ValueChangeSink for FixationStore {
    fn on_value_changed(&self, index: &LogicalIndex, block: u64, new_value: &[u8]) -> Result<()> {
        self.set_value(index, block, new_value.to_vec()).map(|_| ())
    }
}

/// One entry of a parameter-change proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamChange {
    pub index: LogicalIndex,
    pub value: Vec<u8>,
}

impl ParamChange {
    pub fn new(index: impl Into<LogicalIndex>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            index: index.into(),
            value: value.into(),
        }
    }
}

/// Apply every change of a passed proposal at `block`, in order.
///
/// Stops at the first failing change; changes before it stay applied.
pub fn apply_param_changes<S: ValueChangeSink + ?Sized>(
    sink: &S,
    block: u64,
    changes: &[ParamChange],
) -> Result<()> {
    for change in changes {
        sink.on_value_changed(&change.index, block, &change.value)?;
    }
    info!(block, changes = changes.len(), "param changes applied");
    Ok(())
}
