//! Common types used across the platform

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quantities at or below this value are treated as zero demand / empty stock.
pub const QUANTITY_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// True when a quantity is at or below [`QUANTITY_EPSILON`] (negative values included).
pub fn is_negligible(quantity: Decimal) -> bool {
    quantity <= QUANTITY_EPSILON
}

/// True when a quantity is within [`QUANTITY_EPSILON`] of zero in either direction.
pub fn is_near_zero(quantity: Decimal) -> bool {
    quantity.abs() <= QUANTITY_EPSILON
}

/// Date range for queries (both ends inclusive)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Half-open UTC instant bounds `[start 00:00, (end + 1) 00:00)` in the given local offset
    pub fn to_instants(&self, offset: FixedOffset) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = local_midnight(self.start, offset)?;
        let end = local_midnight(self.end.succ_opt()?, offset)?;
        Some((start, end))
    }
}

/// A calendar month in the facility's local time.
///
/// The window is half-open: `start` is the first instant of the month and
/// `end` the first instant of the following month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    /// Build the window for `year`-`month`; `None` for an invalid month
    pub fn new(year: i32, month: u32, offset: FixedOffset) -> Option<Self> {
        let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next_first_day = next_month_start(first_day)?;
        Some(Self {
            year,
            month,
            start: local_midnight(first_day, offset)?,
            end: local_midnight(next_first_day, offset)?,
        })
    }

    /// The month containing `instant`
    pub fn containing(instant: DateTime<Utc>, offset: FixedOffset) -> Option<Self> {
        let local = instant.with_timezone(&offset);
        Self::new(local.year(), local.month(), offset)
    }

    /// The month before the one containing `instant`
    pub fn previous(instant: DateTime<Utc>, offset: FixedOffset) -> Option<Self> {
        let current = Self::containing(instant, offset)?;
        let (year, month) = if current.month == 1 {
            (current.year - 1, 12)
        } else {
            (current.year, current.month - 1)
        };
        Self::new(year, month, offset)
    }

    /// First calendar day of the month (the report's identity)
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// `YYYY-MM` label
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

fn next_month_start(first_day: NaiveDate) -> Option<NaiveDate> {
    if first_day.month() == 12 {
        NaiveDate::from_ymd_opt(first_day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first_day.year(), first_day.month() + 1, 1)
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tashkent() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600).unwrap()
    }

    #[test]
    fn test_epsilon_value() {
        assert_eq!(QUANTITY_EPSILON.to_string(), "0.000000001");
        assert!(is_negligible(Decimal::ZERO));
        assert!(is_negligible(Decimal::from(-3)));
        assert!(!is_negligible(Decimal::new(1, 6)));
    }

    #[test]
    fn test_month_window_bounds_in_local_time() {
        let window = MonthWindow::new(2024, 3, tashkent()).unwrap();
        // 2024-03-01 00:00 +05:00 is 2024-02-29 19:00 UTC
        assert_eq!(window.start.to_rfc3339(), "2024-02-29T19:00:00+00:00");
        assert_eq!(window.end.to_rfc3339(), "2024-03-31T19:00:00+00:00");
        assert_eq!(window.label(), "2024-03");
    }

    #[test]
    fn test_month_window_december_rolls_over() {
        let window = MonthWindow::new(2023, 12, FixedOffset::east_opt(0).unwrap()).unwrap();
        assert_eq!(window.end.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_month_window_invalid_month() {
        assert!(MonthWindow::new(2024, 13, tashkent()).is_none());
        assert!(MonthWindow::new(2024, 0, tashkent()).is_none());
    }

    #[test]
    fn test_previous_month_of_january() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let previous = MonthWindow::previous(instant, tashkent()).unwrap();
        assert_eq!((previous.year, previous.month), (2023, 12));
    }

    #[test]
    fn test_containing_uses_local_offset() {
        // 2024-04-30 20:00 UTC is already May 1st in Tashkent
        let instant = Utc.with_ymd_and_hms(2024, 4, 30, 20, 0, 0).unwrap();
        let window = MonthWindow::containing(instant, tashkent()).unwrap();
        assert_eq!((window.year, window.month), (2024, 5));
        assert!(window.contains(instant));
    }

    #[test]
    fn test_date_range_is_inclusive_of_end_day() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        let (start, end) = range.to_instants(FixedOffset::east_opt(0).unwrap()).unwrap();
        assert_eq!((end - start).num_hours(), 24);
    }
}
