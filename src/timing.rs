//! Frame timing

use std::time::Instant;

/// Timing values for one frame, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTiming {
    /// Time since the previous frame
    pub delta_time: f32,
    /// Time since the clock started
    pub elapsed_time: f64,
}

/// Produces one [`FrameTiming`] per loop iteration
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_elapsed: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(start: Instant) -> Self {
        Self {
            start,
            last_elapsed: 0.0,
        }
    }

    /// Sample the wall clock
    pub fn tick(&mut self) -> FrameTiming {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.tick_at(elapsed)
    }

    /// Advance to an explicit time; time never runs backwards
    pub fn tick_at(&mut self, elapsed_time: f64) -> FrameTiming {
        let elapsed_time = elapsed_time.max(self.last_elapsed);
        let delta_time = (elapsed_time - self.last_elapsed) as f32;
        self.last_elapsed = elapsed_time;
        FrameTiming {
            delta_time,
            elapsed_time,
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_at_computes_delta() {
        let mut clock = FrameClock::new();
        let first = clock.tick_at(0.5);
        assert_eq!(first.delta_time, 0.5);
        let second = clock.tick_at(0.75);
        assert_eq!(second.delta_time, 0.25);
        assert_eq!(second.elapsed_time, 0.75);
    }

    #[test]
    fn test_tick_at_never_goes_backwards() {
        let mut clock = FrameClock::new();
        clock.tick_at(2.0);
        let timing = clock.tick_at(1.0);
        assert_eq!(timing.delta_time, 0.0);
        assert_eq!(timing.elapsed_time, 2.0);
    }
}
