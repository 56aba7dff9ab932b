use crate::error::{FixationError, Result};
use crate::store::FixationStore;
use crate::{LogicalIndex, Version};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Encoding contract between a parameter type and its stored payload.
pub trait ValueCodec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// bincode encoding for any serde type.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl<T: Serialize + DeserializeOwned> ValueCodec<T> for BinaryCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| FixationError::Codec(format!("encode: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| FixationError::Codec(format!("decode: {e}")))
    }
}

/// Typed view of one logical index.
pub struct TypedParam<'s, T, C = BinaryCodec> {
    store: &'s FixationStore,
    index: LogicalIndex,
    codec: C,
    _value: PhantomData<fn() -> T>,
}

impl<'s, T, C: ValueCodec<T>> TypedParam<'s, T, C> {
    pub fn index(&self) -> &LogicalIndex {
        &self.index
    }

    pub fn set(&self, block: u64, value: &T) -> Result<Version> {
        let bytes = self.codec.encode(value)?;
        self.store.set_value(&self.index, block, bytes)
    }

    pub fn at(&self, block: u64) -> Result<T> {
        let bytes = self.store.get_value_at(&self.index, block)?;
        self.codec.decode(&bytes)
    }

    pub fn current(&self) -> Result<T> {
        let bytes = self.store.get_current_value(&self.index)?;
        self.codec.decode(&bytes)
    }
}

impl FixationStore {
    /// Typed handle on `index` using [`BinaryCodec`].
    pub fn typed<T>(&self, index: impl Into<LogicalIndex>) -> TypedParam<'_, T>
    where
        BinaryCodec: ValueCodec<T>,
    {
        self.typed_with(index, BinaryCodec)
    }

    pub fn typed_with<T, C: ValueCodec<T>>(
        &self,
        index: impl Into<LogicalIndex>,
        codec: C,
    ) -> TypedParam<'_, T, C> {
        TypedParam {
            store: self,
            index: index.into(),
            codec,
            _value: PhantomData,
        }
    }
}
