//! Fixed-timestep clock shared by the session and the runner

use std::time::{Duration, Instant};

/// Simulation ticks per second
pub const SIMULATION_TPS: u32 = 50;
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Seconds simulated by one tick
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Wall-clock period of the tick loop
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

/// Wall-clock stopwatch for run reports
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_delta_matches_tick_duration() {
        let from_duration = tick_duration().as_secs_f32();
        assert!((tick_delta() - from_duration).abs() < 1e-6);
        assert!((tick_delta() - 0.02).abs() < 1e-6);
    }
}
