/*
 * Clock Module
 *
 * Fixed timestep accumulator. Hosts feed it the wall-clock time of each
 * frame; it answers with the number of whole simulation steps to run so the
 * simulation always advances in identical increments regardless of frame
 * rate. The leftover fraction is exposed as an interpolation alpha.
 */

use std::time::Duration;

pub const DEFAULT_STEPS_PER_SECOND: f32 = 60.0;
// A stalled host never triggers more than this many catch-up steps at once
pub const DEFAULT_MAX_STEPS_PER_ADVANCE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedTimestep {
    step: Duration,
    accumulator: Duration,
    max_steps: usize,
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::from_hz(DEFAULT_STEPS_PER_SECOND)
    }
}

impl FixedTimestep {
    pub fn new(step: Duration) -> Self {
        let step = if step.is_zero() {
            Duration::from_secs_f32(1.0 / DEFAULT_STEPS_PER_SECOND)
        } else {
            step
        };
        Self {
            step,
            accumulator: Duration::ZERO,
            max_steps: DEFAULT_MAX_STEPS_PER_ADVANCE,
        }
    }

    // Rates that are not positive, or too slow to express as a step, use the default
    pub fn from_hz(steps_per_second: f32) -> Self {
        if !(steps_per_second.is_finite() && steps_per_second > 0.0) {
            return Self::new(Duration::ZERO);
        }
        match Duration::try_from_secs_f32(1.0 / steps_per_second) {
            Ok(step) => Self::new(step),
            Err(_) => Self::new(Duration::ZERO),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn step_secs(&self) -> f32 {
        self.step.as_secs_f32()
    }

    /// Adds one frame's worth of elapsed time and returns how many fixed
    /// steps are now due.
    ///
    /// Time beyond the catch-up limit is discarded rather than carried into
    /// the next frame.
    pub fn accumulate(&mut self, frame_time: Duration) -> usize {
        self.accumulator += frame_time;

        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.max_steps {
            self.accumulator -= self.step;
            steps += 1;
        }

        if self.accumulator >= self.step {
            log::debug!(
                "fixed timestep fell behind, dropping {:?} of simulation time",
                self.accumulator
            );
            self.accumulator = Duration::ZERO;
        }

        steps
    }

    // Fraction of a step left in the accumulator, for render interpolation
    pub fn alpha(&self) -> f32 {
        (self.accumulator.as_secs_f32() / self.step.as_secs_f32()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_steps_are_counted_and_remainder_kept() {
        let mut clock = FixedTimestep::new(Duration::from_millis(10));
        assert_eq!(clock.accumulate(Duration::from_millis(25)), 2);
        assert!((clock.alpha() - 0.5).abs() < 1e-6);
        assert_eq!(clock.accumulate(Duration::from_millis(5)), 1);
        assert_eq!(clock.alpha(), 0.0);
    }

    #[test]
    fn short_frames_accumulate() {
        let mut clock = FixedTimestep::new(Duration::from_millis(10));
        assert_eq!(clock.accumulate(Duration::from_millis(4)), 0);
        assert_eq!(clock.accumulate(Duration::from_millis(4)), 0);
        assert_eq!(clock.accumulate(Duration::from_millis(4)), 1);
    }

    #[test]
    fn catch_up_is_capped() {
        let mut clock = FixedTimestep::new(Duration::from_millis(10)).with_max_steps(3);
        assert_eq!(clock.accumulate(Duration::from_secs(1)), 3);
        assert_eq!(clock.alpha(), 0.0);
    }

    #[test]
    fn zero_rates_fall_back_to_default() {
        let clock = FixedTimestep::from_hz(0.0);
        assert!((clock.step_secs() - 1.0 / DEFAULT_STEPS_PER_SECOND).abs() < 1e-6);
    }

    #[test]
    fn vanishing_rates_fall_back_to_default() {
        for rate in [1e-30, f32::MIN_POSITIVE, f32::NAN, -60.0] {
            let clock = FixedTimestep::from_hz(rate);
            assert!((clock.step_secs() - 1.0 / DEFAULT_STEPS_PER_SECOND).abs() < 1e-6);
        }
    }
}
