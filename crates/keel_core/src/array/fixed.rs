use bytemuck::Pod;
use std::ops::Index;

use crate::error::{StorageError, StorageResult};
use crate::id::{ArrayId, IdGenerator};

/// Fixed-capacity, fixed-stride list.
///
/// Elements live in `[0, len)`. Capacity is reserved once at creation and
/// never grows; adding past it is an error rather than a reallocation.
#[derive(Debug, Clone)]
pub struct Array<T> {
    id: ArrayId,
    items: Vec<T>,
    capacity: usize,
}

impl<T> Array<T> {
    pub fn new(ids: &mut IdGenerator, capacity: usize) -> Self {
        Self {
            id: ids.array_id(),
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn id(&self) -> ArrayId {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Byte distance between consecutive elements.
    #[inline]
    pub const fn stride() -> usize {
        std::mem::size_of::<T>()
    }

    /// Append `value` at the end, returning its index.
    pub fn add(&mut self, value: T) -> StorageResult<usize> {
        let at = self.items.len();
        self.insert(at, value)?;
        Ok(at)
    }

    /// Write `value` at `index`, shifting `[index, len)` right by one.
    pub(crate) fn insert(&mut self, index: usize, value: T) -> StorageResult<()> {
        if self.is_full() {
            return Err(StorageError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        if index > self.items.len() {
            return Err(StorageError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        self.items.insert(index, value);
        Ok(())
    }

    /// Remove the element at `index`, shifting everything after it left
    /// by one so order is preserved.
    pub fn remove(&mut self, index: usize) -> StorageResult<T> {
        if index >= self.items.len() {
            return Err(StorageError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Pod> Array<T> {
    /// The occupied elements as raw bytes, for bulk upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.items)
    }
}

impl<T> Index<usize> for Array<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a Array<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
