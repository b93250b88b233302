//! Explicit id generation
//!
//! Every heap, buffer and array gets a numeric id from an [`IdGenerator`]
//! owned by whoever creates it (usually the storage registry). There is
//! no process-wide counter: two registries hand out ids independently.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            pub const fn from_raw(id: u64) -> Self {
                Self(id)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies a [`Heap`](crate::memory::Heap).
    HeapId,
    "heap"
);
define_id!(
    /// Identifies a [`BackingBuffer`](crate::memory::BackingBuffer).
    BufferId,
    "buffer"
);
define_id!(
    /// Identifies an [`Array`](crate::array::Array) or partitioned array.
    ArrayId,
    "array"
);

/// Monotonically increasing id source.
///
/// Ids start at 1 so that 0 never names a live structure.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Start counting from `first`. Useful for restoring a saved scene.
    pub fn starting_at(first: u64) -> Self {
        Self { next: first.max(1) }
    }

    /// Hand out the next raw id. Also used for logical element ids that
    /// must survive the shifting done by partitioned arrays.
    pub fn next_raw(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn heap_id(&mut self) -> HeapId {
        HeapId(self.next_raw())
    }

    pub fn buffer_id(&mut self) -> BufferId {
        BufferId(self.next_raw())
    }

    pub fn array_id(&mut self) -> ArrayId {
        ArrayId(self.next_raw())
    }

    /// The id the next call will return.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
