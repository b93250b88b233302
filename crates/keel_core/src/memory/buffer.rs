use bytemuck::{Pod, PodCastError, Zeroable};
use std::fmt;

use super::ByteRange;
use crate::error::{StorageError, StorageResult};
use crate::id::BufferId;

/// Alignment of the first byte of every backing buffer.
///
/// Heap offsets aligned to any divisor of this value are also aligned in
/// memory, so typed views over them are always valid.
pub const BUFFER_ALIGN: usize = 16;

#[derive(Copy, Clone, Pod, Zeroable)]
#[repr(C, align(16))]
struct Block([u8; BUFFER_ALIGN]);

/// One fixed-size, zero-initialized block of raw memory.
///
/// The size is chosen at creation and never changes. All byte and typed
/// access goes through the bounds-checked accessors below.
pub struct BackingBuffer {
    id: BufferId,
    blocks: Box<[Block]>,
    size: usize,
}

impl BackingBuffer {
    pub fn new(id: BufferId, size: usize) -> Self {
        let blocks = vec![Block::zeroed(); size.div_ceil(BUFFER_ALIGN)].into_boxed_slice();
        Self { id, blocks, size }
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The whole buffer, for bulk copies (e.g. a staging upload).
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Block, u8>(&self.blocks)[..self.size]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Block, u8>(&mut self.blocks)[..self.size]
    }

    /// Validate that `range` lies inside the buffer.
    pub fn check(&self, range: ByteRange) -> StorageResult<std::ops::Range<usize>> {
        match range.offset.checked_add(range.size) {
            Some(end) if end <= self.size => Ok(range.offset..end),
            _ => Err(StorageError::RangeOutOfBounds {
                offset: range.offset,
                size: range.size,
                buffer: self.size,
            }),
        }
    }

    pub fn bytes(&self, range: ByteRange) -> StorageResult<&[u8]> {
        let span = self.check(range)?;
        Ok(&self.as_bytes()[span])
    }

    pub fn bytes_mut(&mut self, range: ByteRange) -> StorageResult<&mut [u8]> {
        let span = self.check(range)?;
        Ok(&mut self.as_bytes_mut()[span])
    }

    /// Reinterpret `range` as a slice of `T`.
    ///
    /// Fails if the range is out of bounds, its size is not a multiple of
    /// `size_of::<T>()`, or its start is not aligned for `T`.
    pub fn view<T: Pod>(&self, range: ByteRange) -> StorageResult<&[T]> {
        let bytes = self.bytes(range)?;
        bytemuck::try_cast_slice(bytes).map_err(|err| cast_error::<T>(err, range))
    }

    pub fn view_mut<T: Pod>(&mut self, range: ByteRange) -> StorageResult<&mut [T]> {
        let bytes = self.bytes_mut(range)?;
        bytemuck::try_cast_slice_mut(bytes).map_err(|err| cast_error::<T>(err, range))
    }
}

fn cast_error<T>(err: PodCastError, range: ByteRange) -> StorageError {
    match err {
        PodCastError::OutputSliceWouldHaveSlop | PodCastError::SizeMismatch => {
            StorageError::SizeMismatch {
                size: range.size,
                stride: std::mem::size_of::<T>(),
            }
        }
        _ => StorageError::Misaligned {
            offset: range.offset,
            align: std::mem::align_of::<T>(),
        },
    }
}

impl fmt::Debug for BackingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}
