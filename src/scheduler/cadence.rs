use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, Days, FixedOffset, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

/// Next trigger instant at or after `now`.
pub trait Cadence: Send + Sync {
    fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc>;
}

#[derive(Debug, Clone)]
pub struct DailyCadence {
    tz: FixedOffset,
    target: NaiveTime,
}

impl DailyCadence {
    /// # Errors
    /// `hour`/`minute` out of range.
    pub fn new(tz: FixedOffset, hour: u32, minute: u32) -> Result<Self> {
        Ok(Self {
            tz,
            target: target_time(hour, minute)?,
        })
    }
}

impl Cadence for DailyCadence {
    fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let localized_now = now.with_timezone(&self.tz);
        let mut date = localized_now.date_naive();
        if localized_now.time() > self.target {
            date = advance(date, 1);
        }
        to_utc(self.tz, date, self.target, now)
    }
}

/// 매주 같은 요일, 같은 시각.
#[derive(Debug, Clone)]
pub struct WeeklyCadence {
    tz: FixedOffset,
    weekday: Weekday,
    target: NaiveTime,
}

impl WeeklyCadence {
    /// # Errors
    /// `hour`/`minute` out of range.
    pub fn new(tz: FixedOffset, weekday: Weekday, hour: u32, minute: u32) -> Result<Self> {
        Ok(Self {
            tz,
            weekday,
            target: target_time(hour, minute)?,
        })
    }
}

impl Cadence for WeeklyCadence {
    fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let localized_now = now.with_timezone(&self.tz);
        let today = localized_now.date_naive();
        let mut days_ahead = (7 + self.weekday.num_days_from_monday()
            - today.weekday().num_days_from_monday())
            % 7;
        if days_ahead == 0 && localized_now.time() > self.target {
            days_ahead = 7;
        }
        to_utc(self.tz, advance(today, days_ahead), self.target, now)
    }
}

fn target_time(hour: u32, minute: u32) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow!("invalid time: {hour:02}:{minute:02}"))
}

fn advance(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(date)
}

fn to_utc(tz: FixedOffset, date: NaiveDate, target: NaiveTime, now: DateTime<Utc>) -> DateTime<Utc> {
    match tz.from_local_datetime(&date.and_time(target)) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Fixed offsets have no gaps.
        LocalResult::None => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::kst;

    fn parse_utc(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn daily_runs_same_day_when_before_trigger() {
        let cadence = DailyCadence::new(kst(), 7, 0).expect("cadence");
        let now = parse_utc("2025-05-11T21:30:00Z"); // 06:30 KST
        assert_eq!(cadence.next_run_from(now), parse_utc("2025-05-11T22:00:00Z"));
    }

    #[test]
    fn daily_runs_next_day_when_past_trigger() {
        let cadence = DailyCadence::new(kst(), 7, 0).expect("cadence");
        let now = parse_utc("2025-05-12T03:00:00Z"); // 12:00 KST
        assert_eq!(cadence.next_run_from(now), parse_utc("2025-05-12T22:00:00Z"));
    }

    #[test]
    fn daily_runs_immediately_at_exact_trigger() {
        let cadence = DailyCadence::new(kst(), 7, 0).expect("cadence");
        let now = parse_utc("2025-05-11T22:00:00Z");
        assert_eq!(cadence.next_run_from(now), now);
    }

    #[test]
    fn weekly_finds_coming_sunday() {
        let cadence = WeeklyCadence::new(kst(), Weekday::Sun, 9, 0).expect("cadence");
        let now = parse_utc("2025-05-12T01:00:00Z"); // Mon 10:00 KST
        assert_eq!(cadence.next_run_from(now), parse_utc("2025-05-18T00:00:00Z"));
    }

    #[test]
    fn weekly_skips_a_week_when_past_trigger_on_the_day() {
        let cadence = WeeklyCadence::new(kst(), Weekday::Sun, 9, 0).expect("cadence");
        let before = parse_utc("2025-05-17T23:00:00Z"); // Sun 08:00 KST
        let after = parse_utc("2025-05-18T01:00:00Z"); // Sun 10:00 KST
        assert_eq!(cadence.next_run_from(before), parse_utc("2025-05-18T00:00:00Z"));
        assert_eq!(cadence.next_run_from(after), parse_utc("2025-05-25T00:00:00Z"));
    }

    #[test]
    fn invalid_time_is_rejected() {
        assert!(DailyCadence::new(kst(), 24, 0).is_err());
        assert!(WeeklyCadence::new(kst(), Weekday::Mon, 9, 60).is_err());
    }
}
