// heap.rs - Free-list sub-allocator over one backing buffer
//
// The free list is kept sorted by (size, offset), so the first range that
// fits during a scan is also the smallest sufficient one. Free ranges are
// always maximal: adjacent ranges are merged on release.

use bytemuck::Pod;
use keel_metrics::{metrics, Counter};

use super::{Allocation, AllocationTracker, BackingBuffer, ByteRange};
use crate::error::{StorageError, StorageResult};
use crate::id::{HeapId, IdGenerator};

/// Variable-size, aligned sub-allocation out of one fixed [`BackingBuffer`].
///
/// Allocation is best-fit over a size-ordered free list; release coalesces
/// with both neighbours. There is no compaction, so long runs of mismatched
/// allocate/release sizes can leave the heap permanently fragmented.
#[derive(Debug)]
pub struct Heap {
    id: HeapId,
    buffer: BackingBuffer,
    free: Vec<ByteRange>,
    tracker: AllocationTracker,
    counters: Counter,
}

impl Heap {
    /// Create a heap with a fresh, zeroed backing buffer of `size` bytes.
    pub fn new(ids: &mut IdGenerator, size: usize) -> Self {
        let id = ids.heap_id();
        let buffer = BackingBuffer::new(ids.buffer_id(), size);
        tracing::debug!(heap = %id, buffer = %buffer.id(), size, "heap created");
        Self {
            id,
            free: whole(size),
            buffer,
            tracker: AllocationTracker::new(),
            counters: Counter::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> HeapId {
        self.id
    }

    /// Total size of the backing buffer in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    /// Allocate `size` bytes with no alignment requirement.
    pub fn allocate_unaligned(&mut self, size: usize) -> StorageResult<Allocation> {
        self.allocate(size, 1)
    }

    /// Allocate `size` bytes whose offset is a multiple of `alignment`.
    ///
    /// Offsets are aligned relative to the start of the backing buffer,
    /// which itself starts on a [`BUFFER_ALIGN`](super::BUFFER_ALIGN)
    /// boundary. Padding skipped in front of the allocation and any
    /// leftover space after it go back on the free list.
    ///
    /// A zero-size request returns an empty handle and does not touch the
    /// free list.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> StorageResult<Allocation> {
        if alignment == 0 {
            return Err(StorageError::InvalidAlignment { alignment });
        }
        if size == 0 {
            return Ok(Allocation::empty());
        }

        let found = self.free.iter().enumerate().find_map(|(index, candidate)| {
            let aligned = align_up(candidate.offset, alignment)?;
            let padding = aligned - candidate.offset;
            let usable = candidate.size.checked_sub(padding)?;
            (usable >= size).then_some((index, aligned))
        });
        let Some((index, aligned)) = found else {
            return Err(self.exhausted(size, alignment));
        };

        let candidate = self.free.remove(index);
        let committed = ByteRange::new(aligned, size);
        let padding = ByteRange::new(candidate.offset, aligned - candidate.offset);
        let remainder = ByteRange::new(committed.end(), candidate.end() - committed.end());
        for piece in [padding, remainder] {
            if !piece.is_empty() {
                self.insert_free(piece);
            }
        }

        self.tracker.record_allocation(size);
        metrics! {
            self.counters.increment("heap.allocate", 1);
            self.counters.increment("heap.padding_bytes", padding.size);
        }
        tracing::trace!(heap = %self.id, offset = aligned, size, alignment, "allocated");
        Ok(Allocation::new(committed))
    }

    /// Return an allocation to the free list, merging it with the free
    /// ranges directly before and after it.
    ///
    /// The handle is consumed. A handle whose range does not fit inside
    /// this heap's buffer is rejected and the free list is left untouched.
    pub fn deallocate(&mut self, allocation: Allocation) -> StorageResult<()> {
        let range = allocation.into_range();
        if range.is_empty() {
            return Ok(());
        }
        self.buffer.check(range)?;

        let before = self.free.iter().position(|r| r.end() == range.offset);
        let after = self.free.iter().position(|r| r.offset == range.end());

        // Remove the higher index first so the lower one stays valid.
        let mut neighbours = [before, after];
        neighbours.sort_unstable_by(|a, b| b.cmp(a));
        let mut merged = range;
        for index in neighbours.into_iter().flatten() {
            merged = merged.merge(self.free.remove(index));
            metrics! {
                self.counters.increment("heap.coalesce", 1);
            }
        }
        self.insert_free(merged);

        self.tracker.record_release(range.size);
        metrics! {
            self.counters.increment("heap.deallocate", 1);
        }
        tracing::trace!(heap = %self.id, offset = range.offset, size = range.size, "deallocated");
        Ok(())
    }

    /// Make the whole buffer one free range again.
    ///
    /// Every handle issued before the call is stale afterwards; passing one
    /// to [`deallocate`](Self::deallocate) corrupts the free list.
    pub fn clear(&mut self) {
        self.free = whole(self.size());
        self.tracker.release_all();
        metrics! {
            self.counters.increment("heap.clear", 1);
        }
        tracing::debug!(heap = %self.id, size = self.size(), "heap cleared");
    }

    /// Free ranges in scan order: ascending size, ties by ascending offset.
    pub fn free_ranges(&self) -> &[ByteRange] {
        &self.free
    }

    pub fn free_bytes(&self) -> usize {
        self.free.iter().map(|r| r.size).sum()
    }

    /// Size of the largest free range (the last one in scan order).
    pub fn largest_free(&self) -> usize {
        self.free.last().map_or(0, |r| r.size)
    }

    /// True if the free list is sorted, non-overlapping, inside the buffer,
    /// and has no two ranges that touch.
    pub fn is_coalesced(&self) -> bool {
        let sorted = self
            .free
            .windows(2)
            .all(|w| (w[0].size, w[0].offset) < (w[1].size, w[1].offset));

        let mut by_offset = self.free.clone();
        by_offset.sort_unstable_by_key(|r| r.offset);
        let separated = by_offset.windows(2).all(|w| w[0].end() < w[1].offset);
        let bounded = by_offset
            .last()
            .map_or(true, |r| !r.is_empty() && r.end() <= self.size());

        sorted && separated && bounded && self.free.iter().all(|r| !r.is_empty())
    }

    pub fn tracker(&self) -> &AllocationTracker {
        &self.tracker
    }

    /// Start a new frame's allocation window on the tracker.
    pub fn reset_frame(&mut self) {
        self.tracker.reset_frame();
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    pub fn buffer(&self) -> &BackingBuffer {
        &self.buffer
    }

    /// The whole backing buffer, for bulk upload.
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    pub fn bytes(&self, allocation: &Allocation) -> StorageResult<&[u8]> {
        self.buffer.bytes(allocation.range())
    }

    pub fn bytes_mut(&mut self, allocation: &Allocation) -> StorageResult<&mut [u8]> {
        self.buffer.bytes_mut(allocation.range())
    }

    pub fn view<T: Pod>(&self, allocation: &Allocation) -> StorageResult<&[T]> {
        self.buffer.view(allocation.range())
    }

    pub fn view_mut<T: Pod>(&mut self, allocation: &Allocation) -> StorageResult<&mut [T]> {
        self.buffer.view_mut(allocation.range())
    }

    fn insert_free(&mut self, range: ByteRange) {
        let key = (range.size, range.offset);
        let at = self.free.partition_point(|r| (r.size, r.offset) < key);
        self.free.insert(at, range);
    }

    fn exhausted(&self, requested: usize, alignment: usize) -> StorageError {
        let free = self.free_bytes();
        let largest = self.largest_free();
        tracing::warn!(heap = %self.id, requested, alignment, free, largest, "heap allocation failed");
        if free < requested {
            StorageError::OutOfMemory {
                requested,
                alignment,
                free,
            }
        } else {
            StorageError::Fragmented {
                requested,
                alignment,
                largest,
            }
        }
    }
}

fn whole(size: usize) -> Vec<ByteRange> {
    if size == 0 {
        Vec::new()
    } else {
        vec![ByteRange::new(0, size)]
    }
}

/// Round `offset` up to the next multiple of `alignment` (non-zero).
fn align_up(offset: usize, alignment: usize) -> Option<usize> {
    match offset % alignment {
        0 => Some(offset),
        rem => offset.checked_add(alignment - rem),
    }
}
