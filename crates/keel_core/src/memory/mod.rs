//! Byte-level memory management
//!
//! A [`Heap`] owns exactly one [`BackingBuffer`] and carves aligned
//! sub-ranges out of it with a size-ordered free list. Allocations are
//! handed out as move-only [`Allocation`] handles; the free list itself
//! is made of plain [`ByteRange`] values.

mod buffer;
mod heap;
mod range;
mod tracker;

pub use buffer::{BackingBuffer, BUFFER_ALIGN};
pub use heap::Heap;
pub use range::{Allocation, ByteRange};
pub use tracker::AllocationTracker;
