//! Storage settings
//!
//! Capacities are decided before a scene loads: one entry per heap to
//! create and optional per-type capacity hints for partitioned arrays.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ServiceError;

/// Storage engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub heaps: Vec<HeapSettings>,
    pub arrays: Vec<ArraySettings>,
    /// Capacity used for a stored type with no entry in `arrays`.
    pub default_array_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapSettings {
    pub name: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArraySettings {
    /// Matches `Stored::NAME` of the element type.
    pub name: String,
    pub capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            heaps: vec![
                HeapSettings {
                    name: "staging".to_owned(),
                    size_bytes: 4 * 1024 * 1024,
                },
                HeapSettings {
                    name: "mesh".to_owned(),
                    size_bytes: 16 * 1024 * 1024,
                },
            ],
            arrays: Vec::new(),
            default_array_capacity: 1024,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, ServiceError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ServiceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), heaps = settings.heaps.len(), "loaded storage settings");
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String, ServiceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Capacity hint for the stored type called `name`.
    pub fn capacity_for(&self, name: &str) -> usize {
        self.arrays
            .iter()
            .find(|a| a.name == name)
            .map_or(self.default_array_capacity, |a| a.capacity)
    }

    /// Reject settings that name the same heap or array twice.
    pub fn validate(&self) -> Result<(), ServiceError> {
        for (i, heap) in self.heaps.iter().enumerate() {
            if self.heaps[..i].iter().any(|h| h.name == heap.name) {
                return Err(ServiceError::DuplicateEntry {
                    name: heap.name.clone(),
                });
            }
        }
        for (i, array) in self.arrays.iter().enumerate() {
            if self.arrays[..i].iter().any(|a| a.name == array.name) {
                return Err(ServiceError::DuplicateEntry {
                    name: array.name.clone(),
                });
            }
        }
        Ok(())
    }
}
