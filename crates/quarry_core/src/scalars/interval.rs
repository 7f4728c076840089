use std::fmt;

use serde::{Deserialize, Serialize};

/// A duration broken into months, days, and sub-day nanoseconds.
///
/// Components are kept separate since they don't have fixed conversions (a
/// month is not a fixed number of days). Comparison normalizes with the
/// assumed conversions below, matching common SQL engine behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub nanos: i64,
}

impl Interval {
    pub const NANOSECONDS_IN_SECOND: i64 = 1_000_000_000;
    pub const NANOSECONDS_IN_MINUTE: i64 = 60 * Self::NANOSECONDS_IN_SECOND;
    pub const NANOSECONDS_IN_HOUR: i64 = 60 * Self::NANOSECONDS_IN_MINUTE;
    pub const NANOSECONDS_IN_DAY: i64 = 24 * Self::NANOSECONDS_IN_HOUR;
    pub const ASSUMED_DAYS_IN_MONTH: i32 = 30;
    pub const ASSUMED_HOURS_IN_DAY: i32 = 24;

    pub const fn new(months: i32, days: i32, nanos: i64) -> Self {
        Interval { months, days, nanos }
    }

    pub fn add_years(&mut self, years: i32) {
        self.months += years * 12;
    }

    pub fn add_months(&mut self, months: i32) {
        self.months += months;
    }

    pub fn add_days(&mut self, days: i32) {
        self.days += days;
    }

    pub fn add_hours(&mut self, hours: i64) {
        self.nanos += hours * Self::NANOSECONDS_IN_HOUR;
    }

    pub fn add_minutes(&mut self, minutes: i64) {
        self.nanos += minutes * Self::NANOSECONDS_IN_MINUTE;
    }

    pub fn add_seconds(&mut self, seconds: i64) {
        self.nanos += seconds * Self::NANOSECONDS_IN_SECOND;
    }

    pub fn add_milliseconds(&mut self, ms: i64) {
        self.nanos += ms * 1_000_000;
    }

    pub fn add_microseconds(&mut self, us: i64) {
        self.nanos += us * 1_000;
    }

    /// Total nanoseconds using the assumed month/day lengths. Used only for
    /// ordering, not for date arithmetic.
    pub fn normalized_nanos(&self) -> i128 {
        let month_nanos = self.months as i128
            * Self::ASSUMED_DAYS_IN_MONTH as i128
            * Self::NANOSECONDS_IN_DAY as i128;
        let day_nanos = self.days as i128 * Self::NANOSECONDS_IN_DAY as i128;
        month_nanos + day_nanos + self.nanos as i128
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} months {} days {} ns", self.months, self.days, self.nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_ordering() {
        let one_month = Interval::new(1, 0, 0);
        let twenty_days = Interval::new(0, 20, 0);
        assert!(one_month.normalized_nanos() > twenty_days.normalized_nanos());
    }
}
