//! Session countdown.

const MS_PER_SEC: u64 = 1_000;

/// Outcome of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Nothing changed: recorder inactive or countdown already expired.
    Idle,
    /// One tick period elapsed.
    Running {
        /// Whole seconds left, rounded up.
        remaining_secs: u64,
    },
    /// The countdown reached zero on this tick. Reported exactly once.
    Expired,
}

/// Monotonic countdown from a configured session length.
///
/// Each active tick subtracts the tick period, so the countdown tracks wall
/// time for any clock cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimer {
    total_secs: u64,
    tick_ms: u64,
    remaining_ms: u64,
    expired: bool,
}

impl SessionTimer {
    /// Creates a countdown of `total_secs` ticking once per second.
    pub fn new(total_secs: u64) -> Self {
        Self::with_tick(total_secs, MS_PER_SEC)
    }

    /// Creates a countdown of `total_secs` advanced by `tick_ms` per tick.
    ///
    /// A zero period is treated as one millisecond.
    pub fn with_tick(total_secs: u64, tick_ms: u64) -> Self {
        Self {
            total_secs,
            tick_ms: tick_ms.max(1),
            remaining_ms: total_secs.saturating_mul(MS_PER_SEC),
            expired: false,
        }
    }

    /// Advances one tick period if the recorder is active.
    pub fn tick(&mut self, recorder_active: bool) -> TimerTick {
        if self.expired || !recorder_active {
            return TimerTick::Idle;
        }

        self.remaining_ms = self.remaining_ms.saturating_sub(self.tick_ms);
        if self.remaining_ms == 0 {
            self.expired = true;
            return TimerTick::Expired;
        }

        TimerTick::Running {
            remaining_secs: self.remaining_secs(),
        }
    }

    /// Whole seconds left, rounded up.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms.div_ceil(MS_PER_SEC)
    }

    /// Whole seconds counted down so far.
    pub fn elapsed_secs(&self) -> u64 {
        self.total_secs - self.remaining_secs()
    }

    /// Returns `true` once the countdown has reached zero.
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for countdown gating and single expiry.

    use super::*;

    #[test]
    fn expires_exactly_once() {
        let mut timer = SessionTimer::new(2);
        assert_eq!(timer.tick(true), TimerTick::Running { remaining_secs: 1 });
        assert_eq!(timer.tick(true), TimerTick::Expired);
        assert_eq!(timer.tick(true), TimerTick::Idle);
        assert_eq!(timer.remaining_secs(), 0);
        assert_eq!(timer.elapsed_secs(), 2);
    }

    #[test]
    fn does_not_count_while_recorder_inactive() {
        let mut timer = SessionTimer::new(5);
        assert_eq!(timer.tick(false), TimerTick::Idle);
        assert_eq!(timer.remaining_secs(), 5);
    }

    #[test]
    fn half_second_ticks_take_two_per_second() {
        let mut timer = SessionTimer::with_tick(2, 500);
        assert_eq!(timer.tick(true), TimerTick::Running { remaining_secs: 2 });
        assert_eq!(timer.elapsed_secs(), 0);
        assert_eq!(timer.tick(true), TimerTick::Running { remaining_secs: 1 });
        assert_eq!(timer.elapsed_secs(), 1);
        assert_eq!(timer.tick(true), TimerTick::Running { remaining_secs: 1 });
        assert_eq!(timer.tick(true), TimerTick::Expired);
        assert_eq!(timer.elapsed_secs(), 2);
    }

    #[test]
    fn period_longer_than_remaining_time_expires() {
        let mut timer = SessionTimer::with_tick(1, 1_500);
        assert_eq!(timer.tick(true), TimerTick::Expired);
        assert_eq!(timer.remaining_secs(), 0);
    }
}
