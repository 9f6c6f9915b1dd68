//! Business-day algebra over a five-day workweek.
//!
//! All scheduling arithmetic in leadtime is carried out in whole business
//! days (Monday through Friday). There is no holiday calendar and no
//! intra-day resolution; dates falling on a weekend are normalized to the
//! adjacent working day before any walk.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Weekday};

/// True for Monday through Friday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The date itself if it is a weekday, otherwise the following Monday.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Days::new(2),
        Weekday::Sun => date + Days::new(1),
        _ => date,
    }
}

/// The date itself if it is a weekday, otherwise the preceding Friday.
pub fn prev_business_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Days::new(1),
        Weekday::Sun => date - Days::new(2),
        _ => date,
    }
}

/// Discard the time-of-day component.
pub fn strip_time(moment: NaiveDateTime) -> NaiveDate {
    moment.date()
}

/// Advance `days` business days from `date`.
///
/// The starting point is normalized backwards to a working day, so
/// `Friday + 1 = Monday`, `Saturday + 1 = Monday` and `Monday + 0 = Monday`.
pub fn add_business_days(date: NaiveDate, days: u32) -> NaiveDate {
    let mut output = prev_business_day(date);
    let mut count = 0;
    while count < days {
        output = output + Days::new(1);
        if is_business_day(output) {
            count += 1;
        }
    }
    output
}

/// Walk `days` business days backwards from `date`.
///
/// Normalizes forwards first, so this is the exact inverse of
/// [`add_business_days`] for any weekday starting point.
pub fn subtract_business_days(date: NaiveDate, days: u32) -> NaiveDate {
    let mut output = next_business_day(date);
    let mut count = 0;
    while count < days {
        output = output - Days::new(1);
        if is_business_day(output) {
            count += 1;
        }
    }
    output
}

/// Number of weekdays in the half-open interval `[start, end)`.
///
/// Monday to Wednesday of the same week counts 2. Returns 0 when
/// `end <= start`.
pub fn count_business_days(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut date = start;
    let mut count = 0;
    while date < end {
        if is_business_day(date) {
            count += 1;
        }
        date = date + Days::new(1);
    }
    count
}
