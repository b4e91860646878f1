// Simulated time: scale, pause and fixed-interval cadences

use serde::{Deserialize, Serialize};

use crate::types::Millis;

/// Converts real elapsed time into simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    pub now: Millis,
    pub time_scale: f64,
    pub paused: bool,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            now: 0.0,
            time_scale: 1.0,
            paused: false,
        }
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `real_delta` real milliseconds and return the simulated delta.
    pub fn advance(&mut self, real_delta: Millis) -> Millis {
        if self.paused || real_delta <= 0.0 || self.time_scale <= 0.0 {
            return 0.0;
        }
        let delta = real_delta * self.time_scale;
        self.now += delta;
        delta
    }

    /// Negative scales are clamped to zero
    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale.max(0.0);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

/// Accumulating timer: `elapsed += delta`, fires once per full interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cadence {
    pub interval: Millis,
    pub elapsed: Millis,
}

impl Cadence {
    pub fn new(interval: Millis) -> Self {
        Self {
            interval,
            elapsed: 0.0,
        }
    }

    /// Accumulate `delta` and return how many intervals completed.
    pub fn advance(&mut self, delta: Millis) -> u32 {
        if delta <= 0.0 || self.interval <= 0.0 {
            return 0;
        }
        self.elapsed += delta;
        let mut fired = 0;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_advance() {
        let mut clock = SimClock::new();
        clock.set_time_scale(3.0);
        assert_eq!(clock.advance(100.0), 300.0);
        assert_eq!(clock.now, 300.0);
    }

    #[test]
    fn test_paused_clock_stands_still() {
        let mut clock = SimClock::new();
        clock.set_paused(true);
        assert_eq!(clock.advance(1000.0), 0.0);
        assert_eq!(clock.now, 0.0);

        clock.set_paused(false);
        clock.set_time_scale(-2.0);
        assert_eq!(clock.advance(1000.0), 0.0);
    }

    #[test]
    fn test_cadence_fires_per_interval() {
        let mut cadence = Cadence::new(1000.0);
        assert_eq!(cadence.advance(999.0), 0);
        assert_eq!(cadence.advance(1.0), 1);
        assert_eq!(cadence.advance(2500.0), 2);
        assert_eq!(cadence.elapsed, 500.0);
        assert_eq!(cadence.advance(0.0), 0);
    }
}
