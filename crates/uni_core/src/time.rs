//! Frame and fixed-step time accounting

/// Time bookkeeping for one world.
///
/// Variable frames feed an accumulator that is drained in fixed steps.
#[derive(Debug, Clone)]
pub struct WorldTime {
    time_step: f64,
    delta_time: f64,
    fixed_accumulator: f64,
    elapsed: f64,
    frame_count: u64,
    fixed_step_count: u64,
}

impl WorldTime {
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            delta_time: 0.0,
            fixed_accumulator: 0.0,
            elapsed: 0.0,
            frame_count: 0,
            fixed_step_count: 0,
        }
    }

    /// Seconds covered by the current frame.
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Seconds waiting to be consumed by fixed updates.
    pub fn fixed_delta_time(&self) -> f64 {
        self.fixed_accumulator
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn set_time_step(&mut self, time_step: f64) {
        if time_step.is_finite() && time_step > 0.0 {
            self.time_step = time_step;
        } else {
            tracing::warn!(time_step, "ignoring non-positive time step");
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fixed_step_count(&self) -> u64 {
        self.fixed_step_count
    }

    /// Interpolation factor between the last two fixed steps.
    pub fn alpha(&self) -> f64 {
        (self.fixed_accumulator / self.time_step).clamp(0.0, 1.0)
    }

    pub(crate) fn begin_frame(&mut self, delta: f64) {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        self.delta_time = delta;
        self.elapsed += delta;
        self.fixed_accumulator += delta;
        self.frame_count += 1;
    }

    pub(crate) fn fixed_step_ready(&self) -> bool {
        self.fixed_accumulator >= self.time_step
    }

    pub(crate) fn consume_fixed_step(&mut self) {
        self.fixed_accumulator -= self.time_step;
        self.fixed_step_count += 1;
    }

    /// Discard whole steps that could not be run this frame.
    pub(crate) fn drop_backlog(&mut self) -> u64 {
        let dropped = (self.fixed_accumulator / self.time_step).floor();
        self.fixed_accumulator -= dropped * self.time_step;
        dropped as u64
    }
}

impl Default for WorldTime {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}
