//! Uni Metrics - instrumentation for the ECS core
//!
//! Counters, per-system phase timings and frame pacing. Everything here is
//! compiled out to empty stubs unless the `metrics` feature is enabled.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use uni_metrics::{Counter, SystemProfiler};
//!
//! let mut counters = Counter::new();
//! counters.increment("entities_created", 1);
//!
//! let mut profiler = SystemProfiler::new();
//! profiler.record("Movement.update", std::time::Duration::from_micros(40));
//! ```

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod frame_timer;
#[cfg(feature = "metrics")]
mod ring_buffer;
#[cfg(feature = "metrics")]
mod system_profiler;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use frame_timer::FrameTimer;
#[cfg(feature = "metrics")]
pub use system_profiler::{SystemProfiler, SystemTiming};

// ============================================================================
// Macros
// ============================================================================

/// Time a block under `name` (zero-cost when metrics disabled)
#[macro_export]
macro_rules! time_scope {
    ($profiler:expr, $name:expr, $body:block) => {{
        let __start = ::std::time::Instant::now();
        let __result = $body;
        $profiler.record($name, __start.elapsed());
        __result
    }};
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
mod stubs {
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub struct Counter;

    impl Counter {
        pub fn new() -> Self { Self }
        pub fn increment(&mut self, _name: &'static str, _value: u64) {}
        pub fn decrement(&mut self, _name: &'static str, _value: u64) {}
        pub fn set(&mut self, _name: &'static str, _value: u64) {}
        pub fn get(&self, _name: &str) -> u64 { 0 }
        pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> { std::iter::empty() }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SystemTiming {
        pub last: Duration,
        pub total: Duration,
        pub calls: u64,
    }

    #[derive(Debug, Default)]
    pub struct SystemProfiler;

    impl SystemProfiler {
        pub fn new() -> Self { Self }
        pub fn begin_frame(&mut self) {}
        pub fn record(&mut self, _name: &str, _elapsed: Duration) {}
        pub fn time_system<F, R>(&mut self, _name: &str, f: F) -> R where F: FnOnce() -> R { f() }
        pub fn timing(&self, _name: &str) -> Option<SystemTiming> { None }
        pub fn get_timing(&self, _name: &str) -> Duration { Duration::ZERO }
        pub fn reset(&mut self) {}
        pub fn iter(&self) -> impl Iterator<Item = (&str, &SystemTiming)> { std::iter::empty() }
    }

    #[derive(Debug, Default)]
    pub struct FrameTimer;

    impl FrameTimer {
        pub fn new(_capacity: usize) -> Self { Self }
        pub fn begin(&mut self) {}
        pub fn end(&mut self) -> Duration { Duration::ZERO }
        pub fn fps(&self) -> f64 { 0.0 }
        pub fn frame_time_ms(&self) -> f64 { 0.0 }
        pub fn frame_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
    }
}

#[cfg(not(feature = "metrics"))]
pub use stubs::{Counter, FrameTimer, SystemProfiler, SystemTiming};
