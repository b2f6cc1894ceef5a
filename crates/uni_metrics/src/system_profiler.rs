//! Per-system phase timings

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Timing record for one named scope, usually `"<system>.<phase>"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemTiming {
    /// Time spent during the current frame (reset by `begin_frame`).
    pub last: Duration,
    /// Time spent since the profiler was created or reset.
    pub total: Duration,
    pub calls: u64,
}

#[derive(Debug, Default)]
pub struct SystemProfiler {
    timings: HashMap<String, SystemTiming>,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame: per-frame timings go back to zero, totals are kept.
    pub fn begin_frame(&mut self) {
        for timing in self.timings.values_mut() {
            timing.last = Duration::ZERO;
        }
    }

    pub fn record(&mut self, name: &str, elapsed: Duration) {
        let timing = match self.timings.get_mut(name) {
            Some(timing) => timing,
            None => self.timings.entry(name.to_string()).or_default(),
        };
        timing.last += elapsed;
        timing.total += elapsed;
        timing.calls += 1;
    }

    pub fn time_system<F, R>(&mut self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    pub fn timing(&self, name: &str) -> Option<SystemTiming> {
        self.timings.get(name).copied()
    }

    /// Accumulated time for `name`, zero if never recorded.
    pub fn get_timing(&self, name: &str) -> Duration {
        self.timings.get(name).map(|t| t.total).unwrap_or(Duration::ZERO)
    }

    pub fn reset(&mut self) {
        self.timings.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SystemTiming)> {
        self.timings.iter().map(|(name, timing)| (name.as_str(), timing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_reset_keeps_totals() {
        let mut profiler = SystemProfiler::new();
        profiler.record("Movement.update", Duration::from_millis(2));
        profiler.record("Movement.update", Duration::from_millis(3));
        let timing = profiler.timing("Movement.update").unwrap();
        assert_eq!(timing.last, Duration::from_millis(5));
        assert_eq!(timing.calls, 2);

        profiler.begin_frame();
        let timing = profiler.timing("Movement.update").unwrap();
        assert_eq!(timing.last, Duration::ZERO);
        assert_eq!(timing.total, Duration::from_millis(5));
        assert_eq!(profiler.get_timing("Unknown.update"), Duration::ZERO);
    }

    #[test]
    fn time_system_returns_closure_value() {
        let mut profiler = SystemProfiler::new();
        let value = profiler.time_system("Spawner.pre_update", || 41 + 1);
        assert_eq!(value, 42);
        assert_eq!(profiler.timing("Spawner.pre_update").map(|t| t.calls), Some(1));
    }
}
