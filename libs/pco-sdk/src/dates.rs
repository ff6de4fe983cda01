//! Calendar windows for the "this week" style filters.
//!
//! Windows are inclusive on both ends and expressed in UTC, with the week
//! running Monday 00:00:00 through Sunday 23:59:59.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

const END_OF_DAY: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    fn between(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start: first.and_time(NaiveTime::MIN).and_utc(),
            end: last.and_time(END_OF_DAY).and_utc(),
        }
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Current UTC date.
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[must_use]
pub fn day_window(day: NaiveDate) -> DateWindow {
    DateWindow::between(day, day)
}

/// Monday through Sunday of the week containing `day`.
#[must_use]
pub fn week_window(day: NaiveDate) -> DateWindow {
    let back = u64::from(day.weekday().num_days_from_monday());
    let monday = day.checked_sub_days(Days::new(back)).unwrap_or(day);
    let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
    DateWindow::between(monday, sunday)
}

/// First through last day of the month containing `day`.
#[must_use]
pub fn month_window(day: NaiveDate) -> DateWindow {
    let first = day.with_day(1).unwrap_or(day);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(day);
    DateWindow::between(first, last)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_runs_monday_to_sunday() {
        // 2024-03-14 is a Thursday
        let w = week_window(date(2024, 3, 14));
        assert_eq!(w.start.to_rfc3339(), "2024-03-11T00:00:00+00:00");
        assert_eq!(w.end.to_rfc3339(), "2024-03-17T23:59:59+00:00");

        assert_eq!(week_window(date(2024, 3, 11)), w);
        assert_eq!(week_window(date(2024, 3, 17)), w);
        assert!(w.contains(date(2024, 3, 17).and_hms_opt(12, 0, 0).unwrap().and_utc()));
        assert!(!w.contains(date(2024, 3, 18).and_time(NaiveTime::MIN).and_utc()));
    }

    #[test]
    fn month_handles_leap_february() {
        let w = month_window(date(2024, 2, 10));
        assert_eq!(w.start.date_naive(), date(2024, 2, 1));
        assert_eq!(w.end.date_naive(), date(2024, 2, 29));

        let w = month_window(date(2023, 12, 31));
        assert_eq!(w.end.date_naive(), date(2023, 12, 31));
    }

    #[test]
    fn day_window_spans_one_day() {
        let w = day_window(date(2024, 1, 1));
        assert_eq!(w.start.date_naive(), w.end.date_naive());
    }
}
