//! Tick-driven elapsed time counter.
//!
//! The clock owns no timer. Whoever drives it calls [`SessionClock::tick`]
//! once per period, which keeps it deterministic under test.

use std::time::Duration;

/// Default tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    #[default]
    Idle,
    Running,
    Stopped,
}

/// Elapsed-time counter advanced by an external tick source.
#[derive(Debug, Clone)]
pub struct SessionClock {
    period: Duration,
    elapsed: Duration,
    state: ClockState,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD)
    }
}

impl SessionClock {
    /// Creates an idle clock that adds `period` per tick.
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            elapsed: Duration::ZERO,
            state: ClockState::Idle,
        }
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    pub const fn state(&self) -> ClockState {
        self.state
    }

    /// Starts counting from the current elapsed value.
    pub const fn start(&mut self) {
        self.state = ClockState::Running;
    }

    /// Freezes the elapsed value.
    pub const fn stop(&mut self) {
        if matches!(self.state, ClockState::Running) {
            self.state = ClockState::Stopped;
        }
    }

    /// Zeroes the counter and returns to idle.
    pub const fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.state = ClockState::Idle;
    }

    /// Advances by one period if running. Returns whether the clock moved.
    pub fn tick(&mut self) -> bool {
        if self.state != ClockState::Running {
            return false;
        }
        self.elapsed = self.elapsed.saturating_add(self.period);
        true
    }

    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whole seconds elapsed.
    pub const fn elapsed_seconds(&self) -> u64 {
        self.elapsed.as_secs()
    }
}

/// Renders seconds as `HH:MM:SS`. Hours keep counting past 99.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_clock_ignores_ticks() {
        let mut clock = SessionClock::default();
        assert!(!clock.tick());
        assert_eq!(clock.elapsed_seconds(), 0);
        assert_eq!(clock.state(), ClockState::Idle);
    }

    #[test]
    fn test_running_clock_counts_ticks() {
        let mut clock = SessionClock::default();
        clock.start();
        for _ in 0..5 {
            assert!(clock.tick());
        }
        assert_eq!(clock.elapsed_seconds(), 5);
    }

    #[test]
    fn test_stop_freezes_elapsed() {
        let mut clock = SessionClock::default();
        clock.start();
        clock.tick();
        clock.tick();
        clock.stop();
        assert!(!clock.tick());
        assert_eq!(clock.elapsed_seconds(), 2);
        assert_eq!(clock.state(), ClockState::Stopped);
    }

    #[test]
    fn test_stop_on_idle_clock_stays_idle() {
        let mut clock = SessionClock::default();
        clock.stop();
        assert_eq!(clock.state(), ClockState::Idle);
    }

    #[test]
    fn test_reset_zeroes_and_idles() {
        let mut clock = SessionClock::default();
        clock.start();
        clock.tick();
        clock.reset();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(clock.state(), ClockState::Idle);
    }

    #[test]
    fn test_sub_second_period_accumulates_whole_seconds() {
        let mut clock = SessionClock::new(Duration::from_millis(250));
        clock.start();
        for _ in 0..7 {
            clock.tick();
        }
        assert_eq!(clock.elapsed(), Duration::from_millis(1750));
        assert_eq!(clock.elapsed_seconds(), 1);
    }

    #[test]
    fn test_format_elapsed_pads_fields() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(61), "00:01:01");
        assert_eq!(format_elapsed(3_725), "01:02:05");
        assert_eq!(format_elapsed(360_000), "100:00:00");
    }
}
