//! Reaction windows and deadline arithmetic on the simulated clock.
//!
//! The host reports a time of day, so deadlines live on a 24 h circle.
//! [`deadline_reached`] folds the signed difference into (-12 h, +12 h]
//! so that a deadline armed just before midnight is not considered passed
//! by the last ticks of the old day.

use chrono::{NaiveTime, TimeDelta};

/// Reaction windows for the two armed states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Time allowed to depress the pedal after the alert starts.
    pub ack_window: TimeDelta,
    /// Time the pedal may be held without any important control movement.
    pub confirm_window: TimeDelta,
}

impl Timing {
    pub fn new(ack_window: TimeDelta, confirm_window: TimeDelta) -> Self {
        Self {
            ack_window,
            confirm_window,
        }
    }

    /// Deadline for the acknowledgement window starting at `now`.
    pub fn ack_deadline(&self, now: NaiveTime) -> NaiveTime {
        now + self.ack_window
    }

    /// Deadline for the confirmation window starting at `now`.
    pub fn confirm_deadline(&self, now: NaiveTime) -> NaiveTime {
        now + self.confirm_window
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            ack_window: TimeDelta::seconds(6),
            confirm_window: TimeDelta::seconds(60),
        }
    }
}

/// `true` when `now` is at or past `deadline`, treating both as points on
/// a 24 h clock.
pub fn deadline_reached(now: NaiveTime, deadline: NaiveTime) -> bool {
    let half_day = TimeDelta::hours(12);
    let mut elapsed = now.signed_duration_since(deadline);
    if elapsed > half_day {
        elapsed -= TimeDelta::days(1);
    } else if elapsed <= -half_day {
        elapsed += TimeDelta::days(1);
    }
    elapsed >= TimeDelta::zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn default_windows() {
        let timing = Timing::default();
        assert_eq!(timing.ack_deadline(at(12, 30, 0)), at(12, 30, 6));
        assert_eq!(timing.confirm_deadline(at(12, 30, 0)), at(12, 31, 0));
    }

    #[test]
    fn reached_at_and_after_deadline() {
        assert!(!deadline_reached(at(12, 30, 5), at(12, 30, 6)));
        assert!(deadline_reached(at(12, 30, 6), at(12, 30, 6)));
        assert!(deadline_reached(at(12, 30, 7), at(12, 30, 6)));
    }

    #[test]
    fn deadline_across_midnight() {
        let deadline = Timing::default().ack_deadline(at(23, 59, 58));
        assert_eq!(deadline, at(0, 0, 4));
        assert!(!deadline_reached(at(23, 59, 59), deadline));
        assert!(!deadline_reached(at(0, 0, 3), deadline));
        assert!(deadline_reached(at(0, 0, 4), deadline));
    }

    #[test]
    fn late_tick_after_midnight_still_fires() {
        assert!(deadline_reached(at(0, 0, 30), at(23, 59, 50)));
    }
}
