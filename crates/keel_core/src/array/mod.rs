//! Fixed-capacity element storage
//!
//! [`Array`] is a fixed-stride list with O(1) append and order-preserving
//! removal. [`PartitionedArray`] layers named, mutually contiguous
//! [`Partition`]s on top of one `Array` so every partition, and the whole
//! array, is always a single contiguous run suitable for bulk upload.

mod fixed;
mod partition;
mod partitioned;

pub use fixed::Array;
pub use partition::Partition;
pub use partitioned::{PartitionedArray, DEFAULT_PARTITION};
