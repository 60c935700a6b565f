use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Weekly replenishment cadence: balances become eligible to reset on a
/// fixed weekday at 00:00 UTC.
///
/// Weeks are ISO weeks (Monday through Sunday), compared as
/// `(iso_year, iso_week)` pairs so that year boundaries order correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub reset_day: Weekday,
}

impl WeeklySchedule {
    pub fn new(reset_day: Weekday) -> Self {
        Self { reset_day }
    }

    /// True when `now` falls in a later ISO week than `last_reset` AND
    /// today is the reset day.
    ///
    /// The weekday gate means a record untouched on the reset day itself
    /// stays stale until the next reset day it is accessed on. Known
    /// limitation of the lazy scheme; there is no background timer.
    pub fn reset_due(&self, last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let last    = (last_reset.iso_week().year(), last_reset.iso_week().week());
        let current = (now.iso_week().year(), now.iso_week().week());
        current > last && now.weekday() == self.reset_day
    }

    /// The next reset instant strictly after `now`: the coming reset day
    /// at 00:00:00 UTC. Exactly on the boundary advances a full week so
    /// callers never see a zero duration until the next reset.
    pub fn next_reset_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days_ahead = (i64::from(self.reset_day.num_days_from_monday())
            - i64::from(now.weekday().num_days_from_monday()))
        .rem_euclid(7);
        let candidate = (now.date_naive() + Duration::days(days_ahead))
            .and_time(NaiveTime::MIN)
            .and_utc();
        if candidate <= now {
            candidate + Duration::days(7)
        } else {
            candidate
        }
    }
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self { reset_day: Weekday::Sun }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    // 2025-06-09 is a Monday, so 06-10 Tue / 06-11 Wed / 06-15 Sun share
    // an ISO week and 06-22 is the Sunday of the following week.

    #[test]
    fn not_due_within_the_same_iso_week() {
        let schedule = WeeklySchedule::default();
        let tuesday = utc(2025, 6, 10, 9);
        assert!(!schedule.reset_due(tuesday, utc(2025, 6, 11, 9)));
        assert!(!schedule.reset_due(tuesday, utc(2025, 6, 15, 9)));
    }

    #[test]
    fn not_due_on_a_weekday_even_after_a_week() {
        let schedule = WeeklySchedule::default();
        let tuesday = utc(2025, 6, 10, 9);
        assert!(!schedule.reset_due(tuesday, utc(2025, 6, 16, 9))); // Monday
        assert!(!schedule.reset_due(tuesday, utc(2025, 6, 20, 9))); // Friday
    }

    #[test]
    fn due_on_the_reset_day_of_a_later_week() {
        let schedule = WeeklySchedule::default();
        let tuesday = utc(2025, 6, 10, 9);
        assert!(schedule.reset_due(tuesday, utc(2025, 6, 22, 0)));
        assert!(schedule.reset_due(tuesday, utc(2025, 7, 6, 18)));
    }

    #[test]
    fn due_across_the_year_boundary() {
        let schedule = WeeklySchedule::default();
        // 2025-12-23 is ISO week 52 of 2025; 2026-01-04 is the Sunday of
        // ISO week 1 of 2026.
        let december = utc(2025, 12, 23, 12);
        assert!(schedule.reset_due(december, utc(2026, 1, 4, 8)));
    }

    #[test]
    fn next_reset_lands_on_the_coming_sunday_midnight() {
        let schedule = WeeklySchedule::default();
        let next = schedule.next_reset_after(utc(2025, 6, 11, 9));
        assert_eq!(next, utc(2025, 6, 15, 0));
    }

    #[test]
    fn next_reset_is_strictly_in_the_future() {
        let schedule = WeeklySchedule::default();
        let instants = [
            utc(2025, 6, 10, 9),
            utc(2025, 6, 15, 0), // exactly on the boundary
            Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap(),
        ];
        for now in instants {
            let next = schedule.next_reset_after(now);
            assert!(next > now, "next reset {next} not after {now}");
            assert_eq!(next.weekday(), Weekday::Sun);
            assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
        }
    }

    #[test]
    fn boundary_instant_advances_a_full_week() {
        let schedule = WeeklySchedule::default();
        let sunday_midnight = utc(2025, 6, 15, 0);
        assert_eq!(schedule.next_reset_after(sunday_midnight), utc(2025, 6, 22, 0));
    }

    #[test]
    fn respects_a_custom_reset_day() {
        let schedule = WeeklySchedule::new(Weekday::Wed);
        let tuesday = utc(2025, 6, 10, 9);
        assert!(schedule.reset_due(tuesday, utc(2025, 6, 18, 9)));
        assert_eq!(schedule.next_reset_after(tuesday), utc(2025, 6, 11, 0));
    }
}
