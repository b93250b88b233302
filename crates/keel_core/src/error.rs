use std::ops::Range;

use thiserror::Error;

use crate::registry::StorageKey;

/// Errors raised by heaps, arrays and the storage registry.
///
/// Every variant describes a caller precondition that was violated. The
/// structure that reported the error is left exactly as it was before the
/// call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("array is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("heap out of memory: requested {requested} bytes (align {alignment}), {free} bytes free")]
    OutOfMemory {
        requested: usize,
        alignment: usize,
        free: usize,
    },

    #[error("heap too fragmented: requested {requested} bytes (align {alignment}), largest free range is {largest} bytes")]
    Fragmented {
        requested: usize,
        alignment: usize,
        largest: usize,
    },

    #[error("alignment must be non-zero")]
    InvalidAlignment { alignment: usize },

    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("element {index} is not inside partition '{partition}' ({range:?})")]
    OutsidePartition {
        index: usize,
        partition: String,
        range: Range<usize>,
    },

    #[error("partition '{name}' does not exist")]
    UnknownPartition { name: String },

    #[error("byte range {offset}+{size} exceeds backing buffer of {buffer} bytes")]
    RangeOutOfBounds {
        offset: usize,
        size: usize,
        buffer: usize,
    },

    #[error("offset {offset} is not aligned to {align} bytes")]
    Misaligned { offset: usize, align: usize },

    #[error("range of {size} bytes is not a multiple of the {stride}-byte stride")]
    SizeMismatch { size: usize, stride: usize },

    #[error("storage key {key} is already registered")]
    AlreadyRegistered { key: String },

    #[error("storage key {key} is not registered")]
    NotRegistered { key: String },

    #[error("storage key {key} holds a different element type than '{expected}'")]
    TypeMismatch { key: StorageKey, expected: &'static str },
}

pub type StorageResult<T> = Result<T, StorageError>;
