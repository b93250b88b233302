use serde::Serialize;
use std::ops::Range;

/// A named, contiguous run of elements inside a partitioned array.
///
/// `start` is an element index, not a byte offset; multiply by the stride
/// to get the physical base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    name: String,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

impl Partition {
    pub(crate) fn new(name: &str, start: usize) -> Self {
        Self {
            name: name.to_owned(),
            start,
            len: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last element.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}
