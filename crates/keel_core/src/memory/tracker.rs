//! Allocation bookkeeping
//!
//! Byte budgets for a heap: what is in use now, the high-water mark, and
//! how much was handed out during the current frame.

use serde::Serialize;

/// Per-heap allocation tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationTracker {
    in_use: usize,
    peak: usize,
    live: usize,
    frame_allocations: usize,
    total_allocations: u64,
}

impl AllocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allocation(&mut self, size: usize) {
        self.in_use += size;
        self.peak = self.peak.max(self.in_use);
        self.live += 1;
        self.frame_allocations += size;
        self.total_allocations += 1;
    }

    pub fn record_release(&mut self, size: usize) {
        self.in_use = self.in_use.saturating_sub(size);
        self.live = self.live.saturating_sub(1);
    }

    /// Start a new frame's allocation window.
    pub fn reset_frame(&mut self) {
        self.frame_allocations = 0;
    }

    /// Forget every outstanding allocation (the heap was cleared). The peak
    /// and lifetime totals are kept.
    pub fn release_all(&mut self) {
        self.in_use = 0;
        self.live = 0;
        self.frame_allocations = 0;
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn live_allocations(&self) -> usize {
        self.live
    }

    pub fn frame_allocations(&self) -> usize {
        self.frame_allocations
    }

    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }
}
