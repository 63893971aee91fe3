/// Window Partitioner Module
///
/// Splits a date range into calendar-aware, non-overlapping, contiguous
/// half-open windows of a fixed unit. Windows drive every downstream
/// pipeline step; the total count is computable up front for progress
/// reporting without materializing the sequence.
use crate::errors::RegenError;
use chrono::{DateTime, Days, Months, SecondsFormat, TimeDelta, Utc};

/// A half-open time interval `[start, end)` defining one unit of
/// regeneration work. `start` is inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// ISO-8601 string form of the window start, millisecond precision.
    pub fn ini_string(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// ISO-8601 string form of the window end, millisecond precision.
    pub fn end_string(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.ini_string(), self.end_string())
    }
}

/// Calendar unit by which the cursor advances between windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl StepUnit {
    /// Parse a moment-style unit token (`m`, `h`, `d`, `w`, `M`, `y`) or
    /// its long name. Case matters for the short forms: `m` is minute,
    /// `M` is month.
    pub fn parse(s: &str) -> Result<Self, RegenError> {
        match s {
            "m" | "min" | "minute" | "minutes" => Ok(StepUnit::Minute),
            "h" | "hour" | "hours" => Ok(StepUnit::Hour),
            "d" | "day" | "days" => Ok(StepUnit::Day),
            "w" | "week" | "weeks" => Ok(StepUnit::Week),
            "M" | "mo" | "month" | "months" => Ok(StepUnit::Month),
            "y" | "year" | "years" => Ok(StepUnit::Year),
            other => Err(RegenError::Parameter(format!("unknown step unit [{}]", other))),
        }
    }

    /// Advance a cursor by one unit, calendar-aware. Month and year
    /// advancement respect variable month lengths; a fixed-duration
    /// increment would drift at month boundaries. Panics if the cursor
    /// would pass the end of the supported calendar range: an iterator
    /// that stops advancing would loop forever instead.
    pub fn advance(&self, cursor: DateTime<Utc>) -> DateTime<Utc> {
        const OVERFLOW: &str = "window advancement overflowed the supported calendar range";
        match self {
            StepUnit::Minute => cursor + TimeDelta::minutes(1),
            StepUnit::Hour => cursor + TimeDelta::hours(1),
            StepUnit::Day => cursor.checked_add_days(Days::new(1)).expect(OVERFLOW),
            StepUnit::Week => cursor.checked_add_days(Days::new(7)).expect(OVERFLOW),
            StepUnit::Month => cursor.checked_add_months(Months::new(1)).expect(OVERFLOW),
            StepUnit::Year => cursor.checked_add_months(Months::new(12)).expect(OVERFLOW),
        }
    }
}

impl std::fmt::Display for StepUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StepUnit::Minute => "minute",
            StepUnit::Hour => "hour",
            StepUnit::Day => "day",
            StepUnit::Week => "week",
            StepUnit::Month => "month",
            StepUnit::Year => "year",
        };
        write!(f, "{}", name)
    }
}

/// The partitioned date range. Restartable: `iter()` always starts from
/// the beginning, and `len()` simulates the same advancement without
/// materializing windows.
#[derive(Debug, Clone, Copy)]
pub struct Windows {
    ini: DateTime<Utc>,
    end: DateTime<Utc>,
    unit: StepUnit,
}

impl Windows {
    pub fn new(ini: DateTime<Utc>, end: DateTime<Utc>, unit: StepUnit) -> Result<Self, RegenError> {
        if ini >= end {
            return Err(RegenError::Parameter(format!(
                "iniDate [{}] must be strictly before endDate [{}]",
                ini.to_rfc3339_opts(SecondsFormat::Millis, true),
                end.to_rfc3339_opts(SecondsFormat::Millis, true)
            )));
        }
        Ok(Self { ini, end, unit })
    }

    /// Number of windows the iterator will produce.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.ini;
        while cursor < self.end {
            cursor = self.unit.advance(cursor);
            count += 1;
        }
        count
    }

    pub fn iter(&self) -> WindowIter {
        WindowIter { cursor: self.ini, end: self.end, unit: self.unit }
    }
}

/// Lazy window sequence. Produces a window while the cursor is before the
/// range end; the last window's end is a full unit advance, which may
/// extend past the requested end date (the delete and extraction queries
/// use the full window bounds).
pub struct WindowIter {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    unit: StepUnit,
}

impl Iterator for WindowIter {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        if self.cursor >= self.end {
            return None;
        }
        let start = self.cursor;
        self.cursor = self.unit.advance(self.cursor);
        Some(TimeWindow { start, end: self.cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_three_hourly_windows() {
        let windows = Windows::new(utc(2023, 1, 1, 0), utc(2023, 1, 1, 3), StepUnit::Hour).unwrap();
        let produced: Vec<TimeWindow> = windows.iter().collect();

        assert_eq!(produced.len(), 3);
        assert_eq!(windows.len(), 3);
        assert_eq!(produced[0].start, utc(2023, 1, 1, 0));
        assert_eq!(produced[0].end, utc(2023, 1, 1, 1));
        assert_eq!(produced[1].start, utc(2023, 1, 1, 1));
        assert_eq!(produced[2].end, utc(2023, 1, 1, 3));
    }

    #[test]
    fn test_windows_are_contiguous_and_cover_range() {
        let ini = utc(2023, 3, 15, 7);
        let end = utc(2023, 4, 2, 0);
        let windows = Windows::new(ini, end, StepUnit::Day).unwrap();
        let produced: Vec<TimeWindow> = windows.iter().collect();

        assert_eq!(produced.first().unwrap().start, ini);
        for pair in produced.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        // Last window end reaches or passes the requested end date.
        assert!(produced.last().unwrap().end >= end);
        assert_eq!(produced.len(), windows.len());
    }

    #[test]
    fn test_month_advancement_handles_variable_lengths() {
        let windows = Windows::new(utc(2023, 1, 31, 0), utc(2023, 4, 1, 0), StepUnit::Month).unwrap();
        let produced: Vec<TimeWindow> = windows.iter().collect();

        // Jan 31 -> Feb 28 -> Mar 28 -> Apr 28: three windows, each a real
        // calendar month, never a fixed 30-day jump.
        assert_eq!(produced.len(), 3);
        assert_eq!(produced[0].end, utc(2023, 2, 28, 0));
        assert_eq!(produced[1].end, utc(2023, 3, 28, 0));
    }

    #[test]
    fn test_iter_is_restartable() {
        let windows = Windows::new(utc(2023, 1, 1, 0), utc(2023, 1, 1, 5), StepUnit::Hour).unwrap();
        let first: Vec<TimeWindow> = windows.iter().collect();
        let second: Vec<TimeWindow> = windows.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(Windows::new(utc(2023, 1, 2, 0), utc(2023, 1, 1, 0), StepUnit::Hour).is_err());
        assert!(Windows::new(utc(2023, 1, 1, 0), utc(2023, 1, 1, 0), StepUnit::Hour).is_err());
    }

    #[test]
    #[should_panic(expected = "window advancement overflowed")]
    fn test_advance_panics_at_the_calendar_limit() {
        StepUnit::Day.advance(DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_step_unit_parsing() {
        assert_eq!(StepUnit::parse("h").unwrap(), StepUnit::Hour);
        assert_eq!(StepUnit::parse("m").unwrap(), StepUnit::Minute);
        assert_eq!(StepUnit::parse("M").unwrap(), StepUnit::Month);
        assert_eq!(StepUnit::parse("week").unwrap(), StepUnit::Week);
        assert!(StepUnit::parse("fortnight").is_err());
    }

    #[test]
    fn test_window_iso_strings() {
        let window = TimeWindow { start: utc(2023, 1, 1, 0), end: utc(2023, 1, 1, 1) };
        assert_eq!(window.ini_string(), "2023-01-01T00:00:00.000Z");
        assert_eq!(window.end_string(), "2023-01-01T01:00:00.000Z");
    }
}
