// registry.rs - One storage instance per logical key
//
// Heaps are keyed by an explicit name chosen by the caller. Typed arrays
// are keyed by a compile-time `Stored::KEY`, never by a runtime type name.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use crate::array::PartitionedArray;
use crate::error::{StorageError, StorageResult};
use crate::id::IdGenerator;
use crate::memory::Heap;

pub type StorageKey = u32;

/// An element type that owns a slot in a [`StorageRegistry`].
///
/// Every implementor must pick a `KEY` no other stored type uses. A clash
/// is detected on access and reported as [`StorageError::TypeMismatch`].
pub trait Stored: 'static + Sized + Send + Sync {
    const KEY: StorageKey;

    /// Human-readable name, also used to look up capacity settings.
    const NAME: &'static str;
}

/// Helper macro to implement the [`Stored`] trait.
///
/// # Example
/// ```ignore
/// #[derive(Clone, Copy)]
/// struct Vertex { pos: [f32; 3] }
///
/// define_stored!(Vertex, 1, "Vertex");
/// ```
#[macro_export]
macro_rules! define_stored {
    ($ty:ty, $key:expr, $name:expr) => {
        impl $crate::registry::Stored for $ty {
            const KEY: $crate::registry::StorageKey = $key;
            const NAME: &'static str = $name;
        }
    };
}

struct ArraySlot {
    name: &'static str,
    storage: Box<dyn Any + Send + Sync>,
}

/// Binds each heap name and each stored type to exactly one instance.
///
/// The registry owns the [`IdGenerator`] used for everything it creates,
/// so independent registries never share id state.
pub struct StorageRegistry {
    ids: IdGenerator,
    heaps: BTreeMap<String, Heap>,
    arrays: HashMap<StorageKey, ArraySlot>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::with_ids(IdGenerator::new())
    }

    pub fn with_ids(ids: IdGenerator) -> Self {
        Self {
            ids,
            heaps: BTreeMap::new(),
            arrays: HashMap::new(),
        }
    }

    /// Id source for logical element ids handed out by consumers.
    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    // ------------------------------------------------------------------
    // Heaps
    // ------------------------------------------------------------------

    pub fn create_heap(&mut self, name: &str, size: usize) -> StorageResult<&mut Heap> {
        if self.heaps.contains_key(name) {
            return Err(StorageError::AlreadyRegistered {
                key: name.to_owned(),
            });
        }
        let heap = Heap::new(&mut self.ids, size);
        tracing::info!(heap = name, id = %heap.id(), size, "registered heap");
        Ok(self.heaps.entry(name.to_owned()).or_insert(heap))
    }

    pub fn has_heap(&self, name: &str) -> bool {
        self.heaps.contains_key(name)
    }

    pub fn heap(&self, name: &str) -> StorageResult<&Heap> {
        self.heaps.get(name).ok_or_else(|| not_registered(name))
    }

    pub fn heap_mut(&mut self, name: &str) -> StorageResult<&mut Heap> {
        self.heaps.get_mut(name).ok_or_else(|| not_registered(name))
    }

    /// Unregister a heap and hand it back; dropping it frees the buffer.
    pub fn destroy_heap(&mut self, name: &str) -> StorageResult<Heap> {
        let heap = self.heaps.remove(name).ok_or_else(|| not_registered(name))?;
        tracing::info!(heap = name, id = %heap.id(), "destroyed heap");
        Ok(heap)
    }

    /// Registered heaps in name order.
    pub fn heaps(&self) -> impl Iterator<Item = (&str, &Heap)> + '_ {
        self.heaps.iter().map(|(name, heap)| (name.as_str(), heap))
    }

    // ------------------------------------------------------------------
    // Typed partitioned arrays
    // ------------------------------------------------------------------

    pub fn create_array<T: Stored>(
        &mut self,
        capacity: usize,
    ) -> StorageResult<&mut PartitionedArray<T>> {
        if let Some(slot) = self.arrays.get(&T::KEY) {
            return Err(StorageError::AlreadyRegistered {
                key: format!("{} ({})", slot.name, T::KEY),
            });
        }
        let array = PartitionedArray::<T>::new(&mut self.ids, capacity);
        tracing::info!(stored = T::NAME, key = T::KEY, id = %array.id(), capacity, "registered array");
        let slot = self.arrays.entry(T::KEY).or_insert(ArraySlot {
            name: T::NAME,
            storage: Box::new(array),
        });
        slot.storage
            .downcast_mut::<PartitionedArray<T>>()
            .ok_or(StorageError::TypeMismatch {
                key: T::KEY,
                expected: T::NAME,
            })
    }

    pub fn has_array<T: Stored>(&self) -> bool {
        self.arrays.contains_key(&T::KEY)
    }

    pub fn array<T: Stored>(&self) -> StorageResult<&PartitionedArray<T>> {
        let slot = self
            .arrays
            .get(&T::KEY)
            .ok_or_else(|| not_registered_stored::<T>())?;
        slot.storage
            .downcast_ref::<PartitionedArray<T>>()
            .ok_or(StorageError::TypeMismatch {
                key: T::KEY,
                expected: T::NAME,
            })
    }

    pub fn array_mut<T: Stored>(&mut self) -> StorageResult<&mut PartitionedArray<T>> {
        let slot = self
            .arrays
            .get_mut(&T::KEY)
            .ok_or_else(|| not_registered_stored::<T>())?;
        slot.storage
            .downcast_mut::<PartitionedArray<T>>()
            .ok_or(StorageError::TypeMismatch {
                key: T::KEY,
                expected: T::NAME,
            })
    }

    /// Unregister the array for `T` and hand it back.
    pub fn destroy_array<T: Stored>(&mut self) -> StorageResult<PartitionedArray<T>> {
        // Check the type before removing so a mismatch leaves the slot alone.
        self.array::<T>()?;
        let slot = self
            .arrays
            .remove(&T::KEY)
            .ok_or_else(|| not_registered_stored::<T>())?;
        let array = slot
            .storage
            .downcast::<PartitionedArray<T>>()
            .map_err(|_| StorageError::TypeMismatch {
                key: T::KEY,
                expected: T::NAME,
            })?;
        tracing::info!(stored = T::NAME, key = T::KEY, "destroyed array");
        Ok(*array)
    }

    /// `(key, name)` of every registered array, in key order.
    pub fn array_keys(&self) -> Vec<(StorageKey, &'static str)> {
        let mut keys: Vec<_> = self
            .arrays
            .iter()
            .map(|(&key, slot)| (key, slot.name))
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_registered(name: &str) -> StorageError {
    StorageError::NotRegistered {
        key: name.to_owned(),
    }
}

fn not_registered_stored<T: Stored>() -> StorageError {
    StorageError::NotRegistered {
        key: format!("{} ({})", T::NAME, T::KEY),
    }
}
