//! The date window a feed covers.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

use crate::error::{FeedError, FeedResult};

/// Number of weeks a feed covers when the request does not say otherwise.
pub const DEFAULT_WEEKS: u32 = 3;

/// A range of calendar dates, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Create a window, rejecting one that ends before it starts.
    pub fn new(start: NaiveDate, end: NaiveDate) -> FeedResult<Self> {
        if start > end {
            return Err(FeedError::Validation(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The window of `weeks` whole weeks starting on the Monday of the week containing `today`.
    pub fn from_weeks(today: NaiveDate, weeks: u32) -> FeedResult<Self> {
        if weeks == 0 {
            return Err(FeedError::Validation(String::from(
                "weeks must be at least 1",
            )));
        }
        let monday = today
            .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
            .ok_or_else(|| FeedError::Validation(format!("no monday before {today}")))?;
        let end = monday
            .checked_add_days(Days::new(7 * u64::from(weeks)))
            .ok_or_else(|| FeedError::Validation(format!("{weeks} weeks is out of range")))?;
        Self::new(monday, end)
    }

    /// Resolve the window from request parameters.
    ///
    /// Explicit `start` and `end` win over `weeks`, but only when both are given.
    pub fn resolve(
        today: NaiveDate,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        weeks: Option<u32>,
    ) -> FeedResult<Self> {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Self::from_weeks(today, weeks.unwrap_or(DEFAULT_WEEKS)),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// The last date inside the window, `None` for an empty window.
    pub fn last_day(&self) -> Option<NaiveDate> {
        if self.is_empty() {
            return None;
        }
        self.end.pred_opt()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether a point in time starts on a date inside the window.
    pub fn contains(&self, date_time: &NaiveDateTime) -> bool {
        let date = date_time.date();
        self.start <= date && date < self.end
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;

    use crate::{error::FeedError, window::DateWindow};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[test]
    fn test_from_weeks_starts_on_monday() {
        // 2024-01-04 is a Thursday
        let window = DateWindow::from_weeks(date("2024-01-04"), 3).unwrap();
        assert_eq!(window.start(), date("2024-01-01"));
        assert_eq!(window.end(), date("2024-01-22"));
        let window = DateWindow::from_weeks(date("2024-01-01"), 1).unwrap();
        assert_eq!(window.start(), date("2024-01-01"));
        assert_eq!(window.end(), date("2024-01-08"));
        let window = DateWindow::from_weeks(date("2024-01-07"), 1).unwrap();
        assert_eq!(window.start(), date("2024-01-01"));
    }

    #[test]
    fn test_zero_weeks_is_rejected() {
        let result = DateWindow::from_weeks(date("2024-01-04"), 0);
        assert!(matches!(result, Err(FeedError::Validation(_))));
    }

    #[test]
    fn test_resolve() {
        let today = date("2024-03-13");
        let window = DateWindow::resolve(today, None, None, None).unwrap();
        assert_eq!(window.start(), date("2024-03-11"));
        assert_eq!(window.end(), date("2024-04-01"));

        let window = DateWindow::resolve(
            today,
            Some(date("2024-01-01")),
            Some(date("2024-01-08")),
            Some(5),
        )
        .unwrap();
        assert_eq!(window.start(), date("2024-01-01"));
        assert_eq!(window.end(), date("2024-01-08"));

        // a lone start does not override the weeks
        let window = DateWindow::resolve(today, Some(date("2024-01-01")), None, Some(1)).unwrap();
        assert_eq!(window.start(), date("2024-03-11"));
        assert_eq!(window.end(), date("2024-03-18"));
    }

    #[test]
    fn test_reversed_window_is_rejected() {
        let result = DateWindow::new(date("2024-01-08"), date("2024-01-01"));
        assert!(matches!(result, Err(FeedError::Validation(_))));
    }

    #[test]
    fn test_contains_is_end_exclusive() {
        let window = DateWindow::new(date("2024-01-01"), date("2024-01-08")).unwrap();
        assert!(window.contains(&date("2024-01-01").and_hms_opt(0, 0, 0).unwrap()));
        assert!(window.contains(&date("2024-01-07").and_hms_opt(23, 59, 0).unwrap()));
        assert!(!window.contains(&date("2024-01-08").and_hms_opt(8, 0, 0).unwrap()));
        assert!(!window.contains(&date("2023-12-31").and_hms_opt(8, 0, 0).unwrap()));
        assert_eq!(window.last_day(), Some(date("2024-01-07")));

        let empty = DateWindow::new(date("2024-01-01"), date("2024-01-01")).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.last_day(), None);
    }
}
