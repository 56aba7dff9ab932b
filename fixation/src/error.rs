use crate::LogicalIndex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixationError {
    #[error("unknown index: {0}")]
    UnknownIndex(LogicalIndex),
    #[error("value of {index} at block {block} is no longer retained (earliest {earliest})")]
    ValueNotRetained {
        index: LogicalIndex,
        block: u64,
        earliest: u64,
    },
    #[error("out of order write to {index}: block {block} precedes block {last}")]
    OutOfOrderWrite {
        index: LogicalIndex,
        block: u64,
        last: u64,
    },
    #[error("invalid retention config: {0}")]
    InvalidRetentionConfig(String),
    #[error("version of {index} at block {block} is pinned")]
    VersionPinned { index: LogicalIndex, block: u64 },
    #[error("version of {index} at block {block} is not pinned")]
    NotPinned { index: LogicalIndex, block: u64 },
    #[error("epoch history out of order: {next} follows {previous}")]
    EpochHistoryOutOfOrder { previous: u64, next: u64 },
    #[error("codec error: {0}")]
    Codec(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("config error: {0}")]
    Config(String),
}

impl From<sled::Error> for FixationError {
    fn from(err: sled::Error) -> Self {
        FixationError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for FixationError {
    fn from(err: bincode::Error) -> Self {
        FixationError::Codec(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FixationError>;
