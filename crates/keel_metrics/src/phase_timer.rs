//! Rolling timing of a per-frame update phase

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Times one phase per frame (e.g. the storage mutation phase) and keeps a
/// rolling window of the most recent samples.
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    started: Option<Instant>,
    samples: VecDeque<Duration>,
    window: usize,
}

impl PhaseTimer {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            started: None,
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn begin(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Close the phase opened by `begin`. Calling `end` without a matching
    /// `begin` records nothing.
    pub fn end(&mut self) {
        if let Some(start) = self.started.take() {
            self.record(start.elapsed());
        }
    }

    pub fn record(&mut self, sample: Duration) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: Duration = self.samples.iter().sum();
        (sum / self.samples.len() as u32).as_secs_f64() * 1000.0
    }

    pub fn peak_ms(&self) -> f64 {
        self.samples
            .iter()
            .max()
            .map_or(0.0, |d| d.as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window() {
        let mut timer = PhaseTimer::new(3);

        timer.record(Duration::from_millis(10));
        assert_eq!(timer.average_ms(), 10.0);

        timer.record(Duration::from_millis(20));
        timer.record(Duration::from_millis(30));
        assert_eq!(timer.average_ms(), 20.0);

        // Oldest sample falls out of the window
        timer.record(Duration::from_millis(40));
        assert_eq!(timer.len(), 3);
        assert_eq!(timer.average_ms(), 30.0);
        assert_eq!(timer.peak_ms(), 40.0);
    }

    #[test]
    fn end_without_begin_is_ignored() {
        let mut timer = PhaseTimer::new(4);
        timer.end();
        assert!(timer.is_empty());
    }
}
