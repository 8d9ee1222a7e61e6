use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ScheduleError;

/// When a job fires.
///
/// Accepts six-field cron expressions with seconds (`0 */5 * * * *`), the
/// cron shorthands (`@hourly`, `@daily`, ...) and fixed intervals
/// (`@every 90s`, `@every 250ms`, `@every 1h 30m`).
#[derive(Debug, Clone)]
pub enum Trigger {
    Cron(Box<cron::Schedule>),
    Every(Duration),
}

impl Trigger {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let expr = expr.trim();
        if let Some(interval) = expr.strip_prefix("@every") {
            return parse_interval(interval.trim())
                .map(Self::Every)
                .ok_or_else(|| ScheduleError::Interval(expr.to_owned()));
        }
        cron::Schedule::from_str(expr)
            .map(|schedule| Self::Cron(Box::new(schedule)))
            .map_err(|source| ScheduleError::Cron {
                expr: expr.to_owned(),
                source,
            })
    }

    /// Next fire time strictly after `now`, if the schedule has one.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron(schedule) => schedule.after(&now).next(),
            Self::Every(interval) => chrono::Duration::from_std(*interval)
                .ok()
                .map(|step| now + step),
        }
    }

    /// How long to sleep from `now` until the next fire time.
    pub fn delay_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        let next = self.next_after(now)?;
        Some((next - now).to_std().unwrap_or(Duration::ZERO))
    }
}

fn parse_interval(raw: &str) -> Option<Duration> {
    humantime::parse_duration(raw)
        .ok()
        .filter(|interval| !interval.is_zero())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn cron_with_seconds() {
        let trigger = Trigger::parse("0 */5 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2023, 3, 4, 18, 58, 10).unwrap();
        assert_eq!(
            trigger.next_after(now),
            Some(Utc.with_ymd_and_hms(2023, 3, 4, 19, 0, 0).unwrap())
        );
        assert_eq!(trigger.delay_after(now), Some(Duration::from_secs(110)));
    }

    #[test]
    fn every_interval() {
        let trigger = Trigger::parse("@every 250ms").unwrap();
        let now = Utc::now();
        assert_eq!(trigger.delay_after(now), Some(Duration::from_millis(250)));
        assert!(matches!(Trigger::parse("@every 2m"), Ok(Trigger::Every(d)) if d == Duration::from_secs(120)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(Trigger::parse("@every"), Err(ScheduleError::Interval(_))));
        assert!(matches!(Trigger::parse("@every 0s"), Err(ScheduleError::Interval(_))));
        assert!(matches!(Trigger::parse("@every 5 fortnights"), Err(ScheduleError::Interval(_))));
        assert!(matches!(Trigger::parse("whenever"), Err(ScheduleError::Cron { .. })));
    }

    #[test]
    fn out_of_range_interval_is_an_error() {
        assert!(matches!(
            Trigger::parse("@every 9999999999999999999h"),
            Err(ScheduleError::Interval(_))
        ));
        assert!(matches!(
            Trigger::parse("@every 99999999999999999999999s"),
            Err(ScheduleError::Interval(_))
        ));
    }

    #[test]
    fn shorthand() {
        assert!(matches!(Trigger::parse("@hourly"), Ok(Trigger::Cron(_))));
    }
}
