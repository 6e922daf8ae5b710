// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fortnightly sign-off calendar.
//!
//! Sign-off happens on every other Sunday, counted from a fixed anchor
//! Sunday. ISO week parity is not used; it drifts across year boundaries
//! with 53-week years.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc, Weekday};

/// Length of the sign-off cycle in days.
pub const CYCLE_DAYS: i64 = 14;

/// Whether `date` is a sign-off Sunday for the given anchor.
pub fn is_fortnightly_sunday(date: NaiveDate, anchor: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
        && date.signed_duration_since(anchor).num_days().rem_euclid(CYCLE_DAYS) == 0
}

/// First sign-off Sunday on or after `from`, or `None` if `anchor` is not a
/// Sunday.
pub fn next_signoff_sunday(from: NaiveDate, anchor: NaiveDate) -> Option<NaiveDate> {
    if anchor.weekday() != Weekday::Sun {
        return None;
    }
    let offset = (CYCLE_DAYS
        - from.signed_duration_since(anchor).num_days().rem_euclid(CYCLE_DAYS))
        % CYCLE_DAYS;
    from.checked_add_signed(Duration::days(offset))
}

/// The current calendar date in the scheduler's time base.
pub fn today(use_utc: bool) -> NaiveDate {
    if use_utc {
        Utc::now().date_naive()
    } else {
        Local::now().date_naive()
    }
}

/// Next cron firing after `now`, with the calendar date it falls on in the
/// scheduler's time base.
pub fn next_fire(
    schedule: &cron::Schedule,
    now: DateTime<Utc>,
    use_utc: bool,
) -> Option<(DateTime<Utc>, NaiveDate)> {
    if use_utc {
        schedule.after(&now).next().map(|t| (t, t.date_naive()))
    } else {
        schedule
            .after(&now.with_timezone(&Local))
            .next()
            .map(|t| (t.with_timezone(&Utc), t.date_naive()))
    }
}
