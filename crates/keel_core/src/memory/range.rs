use serde::{Deserialize, Serialize};

/// A span of bytes inside a backing buffer.
///
/// Used for free-list entries and as the payload of an [`Allocation`].
/// It is a plain value with no ownership of the bytes it describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: usize,
    pub size: usize,
}

impl ByteRange {
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// One past the last byte.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn overlaps(&self, other: &ByteRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.offset < other.end() && other.offset < self.end()
    }

    /// True if `other` starts exactly where `self` ends or vice versa.
    pub fn is_adjacent(&self, other: &ByteRange) -> bool {
        self.end() == other.offset || other.end() == self.offset
    }

    /// Union of two adjacent ranges.
    pub(crate) fn merge(self, other: ByteRange) -> ByteRange {
        debug_assert!(self.is_adjacent(&other));
        ByteRange::new(self.offset.min(other.offset), self.size + other.size)
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.offset..self.end()
    }
}

/// A live sub-allocation borrowed from a [`Heap`](super::Heap).
///
/// The handle is move-only: handing it back to
/// [`Heap::deallocate`](super::Heap::deallocate) consumes it, so the same
/// handle cannot be released twice. The heap keeps no record of outstanding
/// handles; after [`Heap::clear`](super::Heap::clear) every older handle is
/// stale and must be dropped by the caller instead of released.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping an Allocation leaks its bytes until the heap is cleared"]
pub struct Allocation {
    range: ByteRange,
}

impl Allocation {
    pub(crate) fn new(range: ByteRange) -> Self {
        Self { range }
    }

    pub(crate) fn empty() -> Self {
        Self::new(ByteRange::default())
    }

    pub fn range(&self) -> ByteRange {
        self.range
    }

    pub fn offset(&self) -> usize {
        self.range.offset
    }

    pub fn size(&self) -> usize {
        self.range.size
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub(crate) fn into_range(self) -> ByteRange {
        self.range
    }
}
