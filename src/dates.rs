//! Calendar helpers that never overflow into a neighbouring month.

use chrono::{Datelike, Duration, NaiveDate};

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .map(|first_next| (first_next - Duration::days(1)).day())
        .unwrap_or(28)
}

/// Moves `date` by `months` calendar months, clamping the day to the target month's length.
pub fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let index = date.year() * 12 + date.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// Replaces the day-of-month, clamping to the month's last day.
pub fn with_day_clamped(date: NaiveDate, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(date.year(), date.month()));
    date.with_day(day).unwrap_or(date)
}

/// First representable statement date; used when a card has no statement yet.
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}
