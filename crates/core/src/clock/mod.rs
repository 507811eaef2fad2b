use serde::{Deserialize, Serialize};

use crate::{MeterError, Result};

/// Timing of one display frame as seen by the ballistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    /// Host timestamp of this frame in milliseconds.
    pub now_ms: f64,
    /// Time since the previous tick; zero on the first tick after start.
    pub delta_ms: f64,
    /// Monotonic tick counter, starting at 1.
    pub index: u64,
}

impl FrameTime {
    pub fn new(now_ms: f64, delta_ms: f64, index: u64) -> Self {
        Self {
            now_ms,
            delta_ms,
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    #[default]
    Idle,
    Running,
    /// Terminal. A stopped clock never produces another frame.
    Stopped,
}

/// Cooperative per-frame clock driven by the host's frame callback.
///
/// The clock does not own a thread or a timer: the host calls [`FrameClock::tick`]
/// from its own display callback, and irregular intervals are passed through
/// untouched for the ballistics delta guard to judge.
#[derive(Debug, Default)]
pub struct FrameClock {
    state: ClockState,
    last_tick_ms: Option<f64>,
    frame_index: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Starts the clock. Starting a running clock is a no-op.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            ClockState::Stopped => Err(MeterError::ClockStopped),
            ClockState::Running => Ok(()),
            ClockState::Idle => {
                self.state = ClockState::Running;
                self.last_tick_ms = None;
                Ok(())
            }
        }
    }

    /// Advances to the host timestamp `now_ms`. Returns `None` unless running.
    pub fn tick(&mut self, now_ms: f64) -> Option<FrameTime> {
        if !self.is_running() {
            return None;
        }

        let delta_ms = match self.last_tick_ms {
            Some(last) => now_ms - last,
            None => 0.0,
        };
        if now_ms.is_finite() {
            self.last_tick_ms = Some(now_ms);
        }
        self.frame_index += 1;

        Some(FrameTime::new(now_ms, delta_ms, self.frame_index))
    }

    /// Advances by an elapsed interval for hosts that only report deltas.
    pub fn tick_elapsed(&mut self, delta_ms: f64) -> Option<FrameTime> {
        let now_ms = match self.last_tick_ms {
            Some(last) => last + delta_ms,
            None => 0.0,
        };
        self.tick(now_ms)
    }

    /// Stops the clock for good. Idempotent.
    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.last_tick_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_clock_produces_no_frames() {
        let mut clock = FrameClock::new();
        assert!(clock.tick(16.0).is_none());
        assert_eq!(clock.frame_index(), 0);
    }

    #[test]
    fn computes_deltas_between_ticks() {
        let mut clock = FrameClock::new();
        clock.start().unwrap();

        let first = clock.tick(1000.0).unwrap();
        assert_eq!(first.delta_ms, 0.0);
        assert_eq!(first.index, 1);

        let second = clock.tick(1016.5).unwrap();
        assert!((second.delta_ms - 16.5).abs() < 1e-9);
        assert_eq!(second.index, 2);

        // A long suspension is reported as-is.
        let resumed = clock.tick(5016.5).unwrap();
        assert!((resumed.delta_ms - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn elapsed_ticks_accumulate_time() {
        let mut clock = FrameClock::new();
        clock.start().unwrap();
        clock.tick_elapsed(0.0);
        clock.tick_elapsed(8.0);
        let frame = clock.tick_elapsed(8.0).unwrap();
        assert_eq!(frame.now_ms, 16.0);
        assert_eq!(frame.delta_ms, 8.0);
    }

    #[test]
    fn stop_is_terminal_and_idempotent() {
        let mut clock = FrameClock::new();
        clock.start().unwrap();
        clock.tick(0.0);
        clock.stop();
        clock.stop();

        assert_eq!(clock.state(), ClockState::Stopped);
        assert!(clock.tick(16.0).is_none());
        assert!(matches!(clock.start(), Err(MeterError::ClockStopped)));
    }
}
