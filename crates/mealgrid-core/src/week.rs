//! Monday-aligned calendar weeks.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::Day;

/// Identifies a calendar week by its Monday.
///
/// Constructing from any date snaps back to the Monday of that week, so two
/// keys built from dates of the same week compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "NaiveDate", into = "NaiveDate")]
pub struct WeekKey(NaiveDate);

impl WeekKey {
    /// The week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let back = u64::from(date.weekday().num_days_from_monday());
        // Subtracting at most six days only fails at NaiveDate::MIN.
        Self(date.checked_sub_days(Days::new(back)).unwrap_or(date))
    }

    /// Monday of this week.
    pub fn start(&self) -> NaiveDate {
        self.0
    }

    /// Calendar date of `day` within this week.
    pub fn date_of(&self, day: Day) -> NaiveDate {
        self.0
            .checked_add_days(Days::new(u64::from(day.offset())))
            .unwrap_or(self.0)
    }

    pub fn next(&self) -> Self {
        Self(self.0.checked_add_days(Days::new(7)).unwrap_or(self.0))
    }

    pub fn previous(&self) -> Self {
        Self(self.0.checked_sub_days(Days::new(7)).unwrap_or(self.0))
    }

    /// The week and day a calendar date falls on.
    pub fn locate(date: NaiveDate) -> (Self, Day) {
        (Self::containing(date), Day::from_weekday(date.weekday()))
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for WeekKey {
    fn from(date: NaiveDate) -> Self {
        Self::containing(date)
    }
}

impl From<WeekKey> for NaiveDate {
    fn from(week: WeekKey) -> Self {
        week.0
    }
}

impl FromStr for WeekKey {
    type Err = WeekKeyParseError;

    /// Parses any `YYYY-MM-DD` date and snaps it to its week.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self::containing)
            .map_err(|_| WeekKeyParseError(s.to_owned()))
    }
}

/// Error returned when parsing an invalid week string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid week date: {0:?} (expected YYYY-MM-DD)")]
pub struct WeekKeyParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn containing_snaps_to_monday() {
        // 2026-10-19 is a Monday.
        let monday = date(2026, 10, 19);
        assert_eq!(WeekKey::containing(monday).start(), monday);
        assert_eq!(WeekKey::containing(date(2026, 10, 22)).start(), monday);
        assert_eq!(WeekKey::containing(date(2026, 10, 25)).start(), monday);
        assert_eq!(WeekKey::containing(date(2026, 10, 26)).start(), date(2026, 10, 26));
    }

    #[test]
    fn date_of_each_day() {
        let week = WeekKey::containing(date(2026, 10, 21));
        assert_eq!(week.date_of(Day::Monday), date(2026, 10, 19));
        assert_eq!(week.date_of(Day::Sunday), date(2026, 10, 25));
    }

    #[test]
    fn next_and_previous_cross_month_and_year() {
        let week = WeekKey::containing(date(2026, 12, 30));
        assert_eq!(week.start(), date(2026, 12, 28));
        assert_eq!(week.next().start(), date(2027, 1, 4));
        assert_eq!(week.next().previous(), week);
    }

    #[test]
    fn locate_returns_week_and_day() {
        let (week, day) = WeekKey::locate(date(2026, 10, 24));
        assert_eq!(week.start(), date(2026, 10, 19));
        assert_eq!(day, Day::Saturday);
    }

    #[test]
    fn parse_and_display() {
        let week: WeekKey = "2026-10-23".parse().unwrap();
        assert_eq!(week.to_string(), "2026-10-19");
        assert!("next tuesday".parse::<WeekKey>().is_err());
    }

    #[test]
    fn serde_snaps_on_deserialize() {
        let week: WeekKey = serde_json::from_str("\"2026-10-21\"").unwrap();
        assert_eq!(serde_json::to_string(&week).unwrap(), "\"2026-10-19\"");
    }
}
