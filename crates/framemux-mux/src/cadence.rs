use std::time::{Duration, Instant};

/// Fixed-interval output schedule.
///
/// The first tick is due immediately. Later ticks are scheduled on the
/// established grid so that rounding in the readiness wait does not accumulate
/// into drift; after falling a whole interval behind, the grid restarts at
/// the late tick instead of bursting to catch up.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: Duration,
    last_tick: Option<Instant>,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: None,
        }
    }

    /// Interval for `fps` frames per second (at least one).
    pub fn from_fps(fps: u32) -> Self {
        Self::new(Duration::from_secs(1) / fps.max(1))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_tick(&self) -> Option<Instant> {
        self.last_tick
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.time_until_due(now).is_zero()
    }

    /// How long the loop may wait before the next tick.
    pub fn time_until_due(&self, now: Instant) -> Duration {
        match self.last_tick {
            None => Duration::ZERO,
            Some(last) => (last + self.interval).saturating_duration_since(now),
        }
    }

    /// Consume the tick if it is due.
    pub fn try_tick(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return true;
        };

        let due = last + self.interval;
        if now < due {
            return false;
        }

        self.last_tick = if now.saturating_duration_since(due) >= self.interval {
            Some(now)
        } else {
            Some(due)
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_immediate() {
        let mut cadence = Cadence::from_fps(10);
        let t0 = Instant::now();
        assert!(cadence.is_due(t0));
        assert!(cadence.try_tick(t0));
        assert!(!cadence.try_tick(t0));
        assert_eq!(cadence.time_until_due(t0), Duration::from_millis(100));
    }

    #[test]
    fn interval_from_fps() {
        assert_eq!(Cadence::from_fps(10).interval(), Duration::from_millis(100));
        assert_eq!(Cadence::from_fps(0).interval(), Duration::from_secs(1));
        assert_eq!(Cadence::from_fps(3).interval(), Duration::from_nanos(333_333_333));
    }

    #[test]
    fn late_ticks_stay_on_grid() {
        let mut cadence = Cadence::from_fps(10);
        let t0 = Instant::now();
        cadence.try_tick(t0);

        // 1 ms late: next deadline is still t0 + 200 ms.
        assert!(cadence.try_tick(t0 + Duration::from_millis(101)));
        assert_eq!(cadence.last_tick(), Some(t0 + Duration::from_millis(100)));
        assert_eq!(
            cadence.time_until_due(t0 + Duration::from_millis(101)),
            Duration::from_millis(99)
        );
    }

    #[test]
    fn stall_restarts_grid_without_burst() {
        let mut cadence = Cadence::from_fps(10);
        let t0 = Instant::now();
        cadence.try_tick(t0);

        let late = t0 + Duration::from_millis(750);
        assert!(cadence.try_tick(late));
        assert!(!cadence.try_tick(late));
        assert_eq!(cadence.last_tick(), Some(late));
    }

    #[test]
    fn tick_count_over_simulated_duration() {
        let mut cadence = Cadence::from_fps(10);
        let t0 = Instant::now();
        let mut ticks = 0;
        let mut now = t0;
        while now < t0 + Duration::from_secs(10) {
            if cadence.try_tick(now) {
                ticks += 1;
            }
            now += Duration::from_millis(7);
        }
        assert!((99..=101).contains(&ticks), "ticks = {ticks}");
    }
}
