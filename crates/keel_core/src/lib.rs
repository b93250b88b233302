//! Keel Storage Core
//!
//! The storage engine under the rendering, physics and animation layers:
//! - Free-list heap sub-allocation over one fixed backing buffer
//! - Fixed-capacity arrays with order-preserving removal
//! - Partitioned arrays whose named regions stay mutually contiguous
//! - A registry binding heap names and stored types to single instances
//!
//! Capacity is always chosen up front; nothing grows in place. Every
//! precondition violation is returned as a [`StorageError`].

pub mod array;
pub mod error;
pub mod id;
pub mod memory;
pub mod registry;

pub use array::{Array, Partition, PartitionedArray, DEFAULT_PARTITION};
pub use error::{StorageError, StorageResult};
pub use id::{ArrayId, BufferId, HeapId, IdGenerator};
pub use memory::{Allocation, AllocationTracker, BackingBuffer, ByteRange, Heap, BUFFER_ALIGN};
pub use registry::{StorageKey, StorageRegistry, Stored};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
