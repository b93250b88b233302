//! Named counters for storage events

use std::collections::BTreeMap;

/// Event counters keyed by a static name such as `"heap.allocate"`.
///
/// Keys are `&'static str` so incrementing never allocates once a key
/// has been seen.
#[derive(Debug, Default, Clone)]
pub struct Counter {
    counters: BTreeMap<&'static str, usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
        }
    }

    pub fn increment(&mut self, name: &'static str, value: usize) {
        *self.counters.entry(name).or_insert(0) += value;
    }

    pub fn get(&self, name: &str) -> usize {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    /// Iterate counters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counters.iter().map(|(name, value)| (*name, *value))
    }
}
