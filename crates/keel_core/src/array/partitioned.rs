// partitioned.rs - Named, mutually contiguous regions inside one Array
//
// Partitions are kept in creation order. Concatenating their views in that
// order always reproduces the whole `[0, len)` sequence: inserting into a
// partition shifts every later element right by one and bumps the start of
// every later partition; removal does the reverse.

use bytemuck::Pod;
use keel_metrics::{metrics, Counter};
use rayon::prelude::*;
use std::collections::HashMap;
use std::ops::Range;

use super::{Array, Partition};
use crate::error::{StorageError, StorageResult};
use crate::id::{ArrayId, IdGenerator};

/// Partition used by call sites that do not need explicit grouping.
pub const DEFAULT_PARTITION: &str = "default";

/// A fixed-capacity array split into named, ordered, contiguous partitions.
///
/// Adding to or removing from a partition costs O(elements after it)
/// because later elements are shifted to keep every partition contiguous.
/// Any index or reference obtained before a mutating call may point at a
/// different element afterwards; re-resolve by partition name and relative
/// index (or by a logical id stored in the element) instead.
///
/// Partitions are never pruned: emptying one leaves a zero-length
/// descriptor in place. Only [`clear`](Self::clear) removes descriptors.
#[derive(Debug, Clone)]
pub struct PartitionedArray<T> {
    array: Array<T>,
    partitions: Vec<Partition>,
    lookup: HashMap<String, usize>,
    counters: Counter,
}

impl<T> PartitionedArray<T> {
    pub fn new(ids: &mut IdGenerator, capacity: usize) -> Self {
        let array = Array::new(ids, capacity);
        tracing::debug!(array = %array.id(), capacity, "partitioned array created");
        Self {
            array,
            partitions: Vec::new(),
            lookup: HashMap::new(),
            counters: Counter::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ArrayId {
        self.array.id()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.array.capacity()
    }

    /// Return the partition called `name`, appending an empty one at the
    /// current end of the array if it does not exist yet.
    pub fn find_or_create(&mut self, name: &str) -> &Partition {
        let slot = self.slot(name);
        &self.partitions[slot]
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Insert `value` at the end of partition `name` (created on first use)
    /// and return its absolute index.
    ///
    /// A full array is reported before any partition is created.
    pub fn add(&mut self, name: &str, value: T) -> StorageResult<usize> {
        if self.array.is_full() {
            tracing::warn!(array = %self.id(), partition = name, capacity = self.capacity(), "partitioned array full");
            return Err(StorageError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        let slot = self.slot(name);
        let at = self.partitions[slot].end();
        let shifted = self.array.len() - at;
        self.array.insert(at, value)?;

        self.partitions[slot].len += 1;
        for later in &mut self.partitions[slot + 1..] {
            later.start += 1;
        }

        metrics! {
            self.counters.increment("partition.add", 1);
            self.counters.increment("partition.shifted", shifted);
        }
        tracing::trace!(array = %self.id(), partition = name, index = at, shifted, "element added");
        debug_assert!(self.is_contiguous());
        Ok(at)
    }

    /// [`add`](Self::add) into [`DEFAULT_PARTITION`].
    pub fn add_default(&mut self, value: T) -> StorageResult<usize> {
        self.add(DEFAULT_PARTITION, value)
    }

    /// Remove the element at absolute `index`, which must lie inside
    /// partition `name`.
    pub fn remove(&mut self, name: &str, index: usize) -> StorageResult<T> {
        let slot = self.existing(name)?;
        let range = self.partitions[slot].range();
        if !range.contains(&index) {
            return Err(StorageError::OutsidePartition {
                index,
                partition: name.to_owned(),
                range,
            });
        }

        let shifted = self.array.len() - index - 1;
        let value = self.array.remove(index)?;

        self.partitions[slot].len -= 1;
        for later in &mut self.partitions[slot + 1..] {
            later.start -= 1;
        }

        metrics! {
            self.counters.increment("partition.remove", 1);
            self.counters.increment("partition.shifted", shifted);
        }
        tracing::trace!(array = %self.id(), partition = name, index, shifted, "element removed");
        debug_assert!(self.is_contiguous());
        Ok(value)
    }

    /// Remove the `relative`-th element of partition `name`.
    pub fn remove_relative(&mut self, name: &str, relative: usize) -> StorageResult<T> {
        let partition = &self.partitions[self.existing(name)?];
        if relative >= partition.len() {
            return Err(StorageError::IndexOutOfBounds {
                index: relative,
                len: partition.len(),
            });
        }
        let index = partition.start() + relative;
        self.remove(name, index)
    }

    /// Empty the array and drop every partition descriptor.
    pub fn clear(&mut self) {
        self.array.clear();
        self.partitions.clear();
        self.lookup.clear();
        tracing::debug!(array = %self.id(), "partitioned array cleared");
    }

    pub fn partition(&self, name: &str) -> StorageResult<&[T]> {
        let range = self.partition_range(name)?;
        Ok(&self.array.as_slice()[range])
    }

    pub fn partition_mut(&mut self, name: &str) -> StorageResult<&mut [T]> {
        let range = self.partition_range(name)?;
        Ok(&mut self.array.as_mut_slice()[range])
    }

    /// Element range currently occupied by partition `name`.
    pub fn partition_range(&self, name: &str) -> StorageResult<Range<usize>> {
        Ok(self.partitions[self.existing(name)?].range())
    }

    /// Byte offset of partition `name` from the start of the array.
    pub fn partition_base_bytes(&self, name: &str) -> StorageResult<usize> {
        Ok(self.partitions[self.existing(name)?].start() * Array::<T>::stride())
    }

    /// The `relative`-th element of partition `name`.
    pub fn get(&self, name: &str, relative: usize) -> StorageResult<&T> {
        let part = self.partition(name)?;
        part.get(relative).ok_or(StorageError::IndexOutOfBounds {
            index: relative,
            len: part.len(),
        })
    }

    pub fn get_mut(&mut self, name: &str, relative: usize) -> StorageResult<&mut T> {
        let part = self.partition_mut(name)?;
        let len = part.len();
        part.get_mut(relative).ok_or(StorageError::IndexOutOfBounds {
            index: relative,
            len,
        })
    }

    /// Partition descriptors in creation order.
    pub fn descriptors(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// `(name, elements)` for every partition, in creation order.
    pub fn partitions(&self) -> impl Iterator<Item = (&str, &[T])> + '_ {
        let items = self.array.as_slice();
        self.partitions
            .iter()
            .map(move |p| (p.name(), &items[p.range()]))
    }

    /// Every element, partitions back to back.
    pub fn as_slice(&self) -> &[T] {
        self.array.as_slice()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.array.iter()
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    /// True if walking partitions in order covers `[0, len)` exactly.
    pub fn is_contiguous(&self) -> bool {
        let mut cursor = 0;
        for partition in &self.partitions {
            if partition.start() != cursor {
                return false;
            }
            cursor = partition.end();
        }
        cursor == self.array.len()
    }

    fn slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.lookup.get(name) {
            return slot;
        }
        let slot = self.partitions.len();
        self.partitions.push(Partition::new(name, self.array.len()));
        self.lookup.insert(name.to_owned(), slot);
        tracing::debug!(array = %self.id(), partition = name, start = self.array.len(), "partition created");
        slot
    }

    fn existing(&self, name: &str) -> StorageResult<usize> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::UnknownPartition {
                name: name.to_owned(),
            })
    }
}

impl<T: Pod> PartitionedArray<T> {
    /// Every element as raw bytes, for bulk upload.
    pub fn as_bytes(&self) -> &[u8] {
        self.array.as_bytes()
    }

    /// One partition as raw bytes.
    pub fn partition_bytes(&self, name: &str) -> StorageResult<&[u8]> {
        Ok(bytemuck::cast_slice(self.partition(name)?))
    }
}

impl<T: Sync> PartitionedArray<T> {
    /// Parallel read-only iterator over one partition.
    ///
    /// The shared borrow keeps every mutation out for as long as the
    /// iterator lives.
    pub fn par_partition(&self, name: &str) -> StorageResult<rayon::slice::Iter<'_, T>> {
        Ok(self.partition(name)?.par_iter())
    }

    /// Relative index of some element of partition `name` matching
    /// `predicate`, searched in parallel. Which match is returned is
    /// unspecified when several exist.
    pub fn par_position_any<F>(&self, name: &str, predicate: F) -> StorageResult<Option<usize>>
    where
        F: Fn(&T) -> bool + Sync + Send,
    {
        Ok(self.par_partition(name)?.position_any(predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parray(capacity: usize) -> PartitionedArray<u32> {
        PartitionedArray::new(&mut IdGenerator::new(), capacity)
    }

    /// State after add(0,"A"); add(1,"B"); add(2,"A").
    fn two_partitions() -> PartitionedArray<u32> {
        let mut arr = parray(10);
        arr.add("A", 0).unwrap();
        arr.add("B", 1).unwrap();
        arr.add("A", 2).unwrap();
        arr
    }

    #[test]
    fn insert_into_earlier_partition_displaces_later_ones() {
        let arr = two_partitions();

        assert_eq!(arr.as_slice(), &[0, 2, 1]);
        assert_eq!(arr.partition("A").unwrap(), &[0, 2]);
        assert_eq!(arr.partition_range("A").unwrap(), 0..2);
        assert_eq!(arr.partition("B").unwrap(), &[1]);
        assert_eq!(arr.partition_range("B").unwrap(), 2..3);
        assert!(arr.is_contiguous());
    }

    #[test]
    fn removal_shifts_later_partitions_back_by_one_stride() {
        let mut arr = two_partitions();
        let base_before = arr.partition_base_bytes("B").unwrap();

        assert_eq!(arr.remove_relative("A", 0).unwrap(), 0);

        assert_eq!(arr.as_slice(), &[2, 1]);
        assert_eq!(arr.partition("A").unwrap(), &[2]);
        assert_eq!(arr.partition("B").unwrap(), &[1]);
        assert_eq!(
            base_before - arr.partition_base_bytes("B").unwrap(),
            std::mem::size_of::<u32>()
        );
    }

    #[test]
    fn partitions_keep_first_use_order() {
        let mut arr = parray(10);
        arr.add("zeta", 1).unwrap();
        arr.add("alpha", 2).unwrap();
        arr.add("zeta", 3).unwrap();

        let names: Vec<_> = arr.partitions().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);

        let flat: Vec<u32> = arr.partitions().flat_map(|(_, items)| items.iter().copied()).collect();
        assert_eq!(flat, arr.as_slice());
    }

    #[test]
    fn find_or_create_positions_new_partition_at_end() {
        let mut arr = parray(10);
        arr.add("A", 7).unwrap();
        let created = arr.find_or_create("B").clone();
        assert_eq!(created.start(), 1);
        assert!(created.is_empty());

        // Existing lookups return the same descriptor.
        assert_eq!(arr.find_or_create("A").range(), 0..1);
        assert_eq!(arr.partition_count(), 2);
        assert!(arr.is_contiguous());
    }

    #[test]
    fn emptied_partition_stays_in_place() {
        let mut arr = parray(10);
        arr.add("A", 1).unwrap();
        arr.add("B", 2).unwrap();
        arr.add("C", 3).unwrap();

        arr.remove("B", 1).unwrap();
        assert!(arr.exists("B"));
        assert_eq!(arr.partition_range("B").unwrap(), 1..1);
        assert_eq!(arr.partition_range("C").unwrap(), 1..2);

        // Refilling lands between A and C again.
        arr.add("B", 4).unwrap();
        assert_eq!(arr.as_slice(), &[1, 4, 3]);
        assert_eq!(arr.partition_count(), 3);
    }

    #[test]
    fn remove_outside_partition_is_rejected() {
        let mut arr = two_partitions();

        assert!(matches!(
            arr.remove("B", 0),
            Err(StorageError::OutsidePartition { index: 0, .. })
        ));
        assert!(matches!(
            arr.remove("missing", 0),
            Err(StorageError::UnknownPartition { .. })
        ));
        assert!(matches!(
            arr.remove_relative("B", 1),
            Err(StorageError::IndexOutOfBounds { index: 1, len: 1 })
        ));
        assert_eq!(arr.as_slice(), &[0, 2, 1]);
    }

    #[test]
    fn full_array_does_not_create_partitions() {
        let mut arr = parray(1);
        arr.add("A", 1).unwrap();
        assert_eq!(
            arr.add("B", 2),
            Err(StorageError::CapacityExceeded { capacity: 1 })
        );
        assert!(!arr.exists("B"));
    }

    #[test]
    fn clear_drops_descriptors_and_restores_capacity() {
        let mut arr = two_partitions();
        arr.clear();
        assert!(arr.is_empty());
        assert_eq!(arr.partition_count(), 0);
        assert!(!arr.exists("A"));

        for v in 0..10 {
            arr.add_default(v).unwrap();
        }
        assert_eq!(arr.partition(DEFAULT_PARTITION).unwrap().len(), 10);
    }

    #[test]
    fn missing_partition_lookups_fail() {
        let arr = parray(4);
        assert!(matches!(
            arr.partition("nope"),
            Err(StorageError::UnknownPartition { .. })
        ));
        assert!(arr.get("nope", 0).is_err());
    }

    #[test]
    fn partition_bytes_are_a_contiguous_slice() {
        let arr = two_partitions();
        let bytes = arr.partition_bytes("A").unwrap();
        assert_eq!(bytes, bytemuck::cast_slice::<u32, u8>(&[0, 2]));
        assert_eq!(arr.as_bytes().len(), 3 * 4);
    }

    #[test]
    fn parallel_search_sees_partition_only() {
        let mut arr = parray(64);
        for v in 0..32 {
            arr.add("low", v).unwrap();
        }
        for v in 100..132 {
            arr.add("high", v).unwrap();
        }

        assert_eq!(arr.par_position_any("high", |&v| v == 120).unwrap(), Some(20));
        assert_eq!(arr.par_position_any("low", |&v| v == 120).unwrap(), None);
        assert_eq!(arr.par_partition("low").unwrap().sum::<u32>(), (0..32).sum());
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut arr = two_partitions();
        *arr.get_mut("B", 0).unwrap() = 9;
        assert_eq!(arr.get("B", 0).unwrap(), &9);
        assert_eq!(arr.as_slice(), &[0, 2, 9]);
    }
}
