use std::time::{Duration, Instant};

const MIN_DT: Duration = Duration::from_micros(100);
const MAX_DT: Duration = Duration::from_millis(250);

/// Timing of one frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    pub now: Instant,
    pub frame_index: u64,
}

/// Produces the delta time handed to a session's frame.
///
/// Deltas are clamped to [0.1 ms, 250 ms] so that a stalled process (debugger,
/// minimized window) does not feed a huge step into REPEAT actions.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(MIN_DT, MAX_DT)
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Restarts timing from now, e.g. after a long pause.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let time = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
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
    fn delta_is_time_since_previous_tick() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick_at(start);

        let time = clock.tick_at(start + Duration::from_millis(16));
        assert!((time.dt - 0.016).abs() < 1e-6);
        assert_eq!(time.frame_index, 1);
    }

    #[test]
    fn long_stalls_are_clamped() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick_at(start);

        let time = clock.tick_at(start + Duration::from_secs(5));
        assert_eq!(time.dt, 0.25);
    }

    #[test]
    fn zero_delta_is_raised_to_minimum() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick_at(start);

        let time = clock.tick_at(start);
        assert_eq!(time.dt, MIN_DT.as_secs_f32());
    }
}
