//! Keel Services Layer
//!
//! Settings loading and storage bootstrap for the engine runtime.

pub mod settings;

use keel_core::{PartitionedArray, StorageError, StorageRegistry, Stored};
use std::path::PathBuf;
use thiserror::Error;

pub use settings::{ArraySettings, HeapSettings, Settings};

/// Errors raised while loading settings or bootstrapping storage.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to read settings from {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("settings name '{name}' more than once")]
    DuplicateEntry { name: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Create a registry holding every heap named in `settings`.
pub fn init_services(settings: &Settings) -> Result<StorageRegistry, ServiceError> {
    settings.validate()?;
    let mut registry = StorageRegistry::new();
    for heap in &settings.heaps {
        registry.create_heap(&heap.name, heap.size_bytes)?;
    }
    tracing::info!(heaps = settings.heaps.len(), "storage services initialized");
    Ok(registry)
}

/// Register the partitioned array for `T`, sized from `settings`.
pub fn register_array<'r, T: Stored>(
    registry: &'r mut StorageRegistry,
    settings: &Settings,
) -> Result<&'r mut PartitionedArray<T>, ServiceError> {
    let capacity = settings.capacity_for(T::NAME);
    Ok(registry.create_array::<T>(capacity)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::define_stored;

    struct Marker(#[allow(dead_code)] u32);
    define_stored!(Marker, 40, "Marker");

    #[test]
    fn bootstrap_creates_configured_heaps() {
        let settings = Settings::default();
        let registry = init_services(&settings).unwrap();

        assert!(registry.has_heap("staging"));
        assert_eq!(registry.heap("mesh").unwrap().size(), 16 * 1024 * 1024);
    }

    #[test]
    fn arrays_pick_up_capacity_hints() {
        let mut settings = Settings::default();
        settings.arrays.push(ArraySettings {
            name: "Marker".to_owned(),
            capacity: 12,
        });
        let mut registry = init_services(&settings).unwrap();

        let markers = register_array::<Marker>(&mut registry, &settings).unwrap();
        assert_eq!(markers.capacity(), 12);
        assert!(matches!(
            register_array::<Marker>(&mut registry, &settings),
            Err(ServiceError::Storage(StorageError::AlreadyRegistered { .. }))
        ));
    }
}
