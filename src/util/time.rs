//! Korea Standard Time helpers.
//!
//! Everything the digest persists is keyed by the KST calendar date. The
//! functions take an explicit `now` so that schedules and tests never depend
//! on the host clock or time zone.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc, Weekday};

pub const KST_OFFSET_HOURS: i32 = 9;

const WEEKDAY_NAMES: [&str; 7] = ["월", "화", "수", "목", "금", "토", "일"];

/// The fixed UTC+9 offset.
#[must_use]
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix())
}

#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[must_use]
pub fn kst_now(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.with_timezone(&kst())
}

/// `YYYY-MM-DD` in KST.
#[must_use]
pub fn kst_date(now: DateTime<Utc>) -> String {
    format_date(kst_now(now).date_naive())
}

#[must_use]
pub fn kst_today(now: DateTime<Utc>) -> NaiveDate {
    kst_now(now).date_naive()
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `MM/DD(요일)` in KST, e.g. `05/12(월)`.
#[must_use]
pub fn kst_date_with_weekday(now: DateTime<Utc>) -> String {
    let local = kst_now(now);
    let weekday = weekday_name(local.weekday());
    format!("{}({weekday})", local.format("%m/%d"))
}

#[must_use]
pub fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAY_NAMES[weekday.num_days_from_monday() as usize]
}

/// The last seven KST dates as `YYYY-MM-DD`, today first.
#[must_use]
pub fn week_dates(now: DateTime<Utc>) -> Vec<String> {
    let today = kst_today(now);
    (0..7)
        .map(|offset| format_date(today - Duration::days(offset)))
        .collect()
}

/// `YYYY/MM` for the archive directory layout.
#[must_use]
pub fn year_month_path(now: DateTime<Utc>) -> String {
    kst_now(now).format("%Y/%m").to_string()
}

#[must_use]
pub fn year_month_of(date: NaiveDate) -> String {
    date.format("%Y/%m").to_string()
}

#[must_use]
pub fn is_weekend(now: DateTime<Utc>) -> bool {
    matches!(kst_now(now).weekday(), Weekday::Sat | Weekday::Sun)
}

/// `YYYY-MM-DD HH:MM:SS` in KST.
#[must_use]
pub fn formatted_datetime(now: DateTime<Utc>) -> String {
    kst_now(now).format("%Y-%m-%d %H:%M:%S").to_string()
}
