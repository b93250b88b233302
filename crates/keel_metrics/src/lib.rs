//! Keel Metrics - Counters and phase timing for the storage engine
//!
//! Instrumentation for heap and array bookkeeping that completely vanishes
//! in production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use keel_metrics::{Counter, PhaseTimer};
//!
//! let mut counters = Counter::new();
//! counters.increment("heap.allocate", 1);
//!
//! let mut timer = PhaseTimer::new(60); // Track last 60 update phases
//! timer.begin();
//! // ... mutate storage ...
//! timer.end();
//! println!("update: {:.3} ms", timer.average_ms());
//! ```
//!
//! Without the `metrics` feature every type below is a zero-sized stub.

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod phase_timer;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use phase_timer::PhaseTimer;

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Execute code only when metrics are enabled
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default, Clone)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&mut self, _name: &'static str, _value: usize) {}
    pub fn get(&self, _name: &str) -> usize { 0 }
    pub fn reset_all(&mut self) {}
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> { std::iter::empty() }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default, Clone)]
pub struct PhaseTimer;

#[cfg(not(feature = "metrics"))]
impl PhaseTimer {
    pub fn new(_window: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self) {}
    pub fn average_ms(&self) -> f64 { 0.0 }
    pub fn peak_ms(&self) -> f64 { 0.0 }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_compiles_without_metrics() {
        // Ensure stubs compile when metrics feature is disabled
        let mut counter = super::Counter::new();
        counter.increment("heap.allocate", 1);
        let mut timer = super::PhaseTimer::new(8);
        timer.begin();
        timer.end();
        assert!(timer.average_ms() >= 0.0);
    }
}
