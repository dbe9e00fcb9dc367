// Triggers: when should a timer fire next
//
// A trigger is asked again after every run, so its answer can move with the
// wall clock instead of being fixed when the timer is created.

use crate::clock::Clock;
use crate::errors::{PeriodError, ScheduleError};
use crate::period::{PeriodKind, PeriodRangeService};
use chrono::DateTime;
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;
use std::sync::Arc;

/// What the timer facility knows about previous firings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerContext {
    /// Instant the previous run was scheduled for
    pub last_scheduled: Option<DateTime<Tz>>,
    /// Instant the previous run finished
    pub last_completed: Option<DateTime<Tz>>,
}

/// ScheduleTrigger trait defines the interface for calculating next execution times
pub trait ScheduleTrigger: Send + Sync {
    /// Calculate the next execution time after the current wall-clock instant
    fn next_execution_time(&self, context: &TriggerContext)
        -> Result<DateTime<Tz>, ScheduleError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Trigger bound to a period kind and offset: fires at the end of the
/// period window that contains "now", recomputed on every call.
#[derive(Clone)]
pub struct RecomputingTrigger {
    kind: PeriodKind,
    offset_minutes: i32,
    range: PeriodRangeService,
}

impl RecomputingTrigger {
    /// Bind a trigger to a period name, failing fast on unknown names or an
    /// offset that would swallow the shortest window of the kind
    pub fn new(
        period: &str,
        offset_minutes: i32,
        range: PeriodRangeService,
    ) -> Result<Self, PeriodError> {
        let kind = range.resolve(period)?;
        let limit_minutes = kind.shortest_window_minutes();
        if offset_minutes >= limit_minutes {
            return Err(PeriodError::OffsetTooLarge {
                period: kind.name(),
                offset_minutes,
                limit_minutes,
            });
        }
        range.effective_window_for(kind, offset_minutes)?;
        Ok(Self {
            kind,
            offset_minutes,
            range,
        })
    }

    pub fn kind(&self) -> PeriodKind {
        self.kind
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset_minutes
    }
}

impl ScheduleTrigger for RecomputingTrigger {
    fn next_execution_time(
        &self,
        _context: &TriggerContext,
    ) -> Result<DateTime<Tz>, ScheduleError> {
        let window = self
            .range
            .effective_window_for(self.kind, self.offset_minutes)?;
        Ok(window.end)
    }

    fn describe(&self) -> String {
        format!("{} (+{}m)", self.kind, self.offset_minutes)
    }
}

/// Parse and validate a cron expression
///
/// Expressions carry second precision: `sec min hour day-of-month month day-of-week [year]`
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Fixed cron trigger evaluated in the clock's timezone
pub struct CronTrigger {
    expression: String,
    schedule: CronSchedule,
    clock: Arc<dyn Clock>,
}

impl CronTrigger {
    pub fn new(expression: &str, clock: Arc<dyn Clock>) -> Result<Self, ScheduleError> {
        Ok(Self {
            expression: expression.to_string(),
            schedule: parse_cron_expression(expression)?,
            clock,
        })
    }
}

impl ScheduleTrigger for CronTrigger {
    fn next_execution_time(
        &self,
        _context: &TriggerContext,
    ) -> Result<DateTime<Tz>, ScheduleError> {
        let now = self.clock.now();
        self.schedule
            .after(&now)
            .next()
            .ok_or_else(|| ScheduleError::NoNextExecution {
                schedule_type: "cron".to_string(),
            })
    }

    fn describe(&self) -> String {
        format!("cron '{}'", self.expression)
    }
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name).map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn range_at(now: DateTime<Tz>) -> PeriodRangeService {
        PeriodRangeService::new(Arc::new(FixedClock::new(now)))
    }

    #[test]
    fn test_parse_valid_cron_expression() {
        assert!(parse_cron_expression("0 0 2 * * *").is_ok());
    }

    #[test]
    fn test_parse_invalid_cron_expression() {
        let err = parse_cron_expression("invalid").unwrap_err();
        assert!(err.to_string().contains("Invalid cron expression"));
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(
            parse_timezone("Asia/Ho_Chi_Minh").unwrap(),
            chrono_tz::Asia::Ho_Chi_Minh
        );
        assert!(parse_timezone("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn test_recomputing_trigger_fires_at_window_end() {
        let trigger =
            RecomputingTrigger::new("WEEKLY_MONDAY", 90, range_at(utc(2023, 1, 17, 0, 0)))
                .unwrap();
        let next = trigger
            .next_execution_time(&TriggerContext::default())
            .unwrap();
        assert_eq!(next, utc(2023, 1, 23, 0, 0));
    }

    #[test]
    fn test_recomputing_trigger_ignores_context() {
        let trigger =
            RecomputingTrigger::new("MONTHLY", 0, range_at(utc(2023, 1, 17, 0, 0))).unwrap();
        let context = TriggerContext {
            last_scheduled: Some(utc(2020, 5, 1, 0, 0)),
            last_completed: Some(utc(2020, 5, 1, 0, 3)),
        };
        assert_eq!(
            trigger.next_execution_time(&context).unwrap(),
            trigger
                .next_execution_time(&TriggerContext::default())
                .unwrap()
        );
    }

    #[test]
    fn test_recomputing_trigger_advances_with_clock() {
        let first = RecomputingTrigger::new("DAILY", 30, range_at(utc(2023, 1, 17, 0, 0)))
            .unwrap()
            .next_execution_time(&TriggerContext::default())
            .unwrap();
        // Asked again exactly at the previous fire time
        let second = RecomputingTrigger::new("DAILY", 30, range_at(first))
            .unwrap()
            .next_execution_time(&TriggerContext::default())
            .unwrap();
        assert_eq!(first, utc(2023, 1, 18, 0, 0));
        assert_eq!(second, first + Duration::days(1));
    }

    #[test]
    fn test_recomputing_trigger_is_strictly_after_now() {
        let mut now = utc(2023, 1, 1, 0, 0);
        while now < utc(2023, 3, 1, 0, 0) {
            for kind in PeriodKind::all() {
                let trigger = RecomputingTrigger::new(&kind.name(), 0, range_at(now)).unwrap();
                let next = trigger
                    .next_execution_time(&TriggerContext::default())
                    .unwrap();
                assert!(next > now, "{} at {} fired at {}", kind, now, next);
            }
            now += Duration::hours(7);
        }
    }

    #[test]
    fn test_recomputing_trigger_rejects_unknown_period() {
        assert!(RecomputingTrigger::new("HOURLY", 0, range_at(utc(2023, 1, 17, 0, 0))).is_err());
    }

    #[test]
    fn test_monthly_offset_must_fit_february() {
        // January is long enough for 29 days, February is not
        let january = range_at(utc(2023, 1, 17, 0, 0));
        let err = RecomputingTrigger::new("MONTHLY", 29 * 24 * 60, january.clone())
            .err()
            .unwrap();
        assert_eq!(
            err,
            PeriodError::OffsetTooLarge {
                period: "MONTHLY".to_string(),
                offset_minutes: 29 * 24 * 60,
                limit_minutes: (28 * 24 - 1) * 60,
            }
        );

        let trigger = RecomputingTrigger::new("MONTHLY", 27 * 24 * 60, january).unwrap();
        let february = RecomputingTrigger::new(
            "MONTHLY",
            trigger.offset_minutes(),
            range_at(utc(2023, 2, 10, 0, 0)),
        )
        .unwrap();
        assert_eq!(
            february
                .next_execution_time(&TriggerContext::default())
                .unwrap(),
            utc(2023, 3, 1, 0, 0)
        );
    }

    #[test]
    fn test_offset_limits_per_kind() {
        let range = range_at(utc(2023, 1, 17, 0, 0));
        assert!(RecomputingTrigger::new("DAILY", 23 * 60 - 1, range.clone()).is_ok());
        assert!(matches!(
            RecomputingTrigger::new("DAILY", 23 * 60, range.clone()),
            Err(PeriodError::OffsetTooLarge { .. })
        ));
        assert!(RecomputingTrigger::new("WEEKLY_FRIDAY", 6 * 24 * 60, range.clone()).is_ok());
        assert!(matches!(
            RecomputingTrigger::new("WEEKLY_FRIDAY", 7 * 24 * 60, range),
            Err(PeriodError::OffsetTooLarge { .. })
        ));
    }

    #[test]
    fn test_cron_trigger_next_day() {
        let clock = Arc::new(FixedClock::new(utc(2023, 1, 17, 3, 0)));
        let trigger = CronTrigger::new("0 0 2 * * *", clock).unwrap();
        assert_eq!(
            trigger
                .next_execution_time(&TriggerContext::default())
                .unwrap(),
            utc(2023, 1, 18, 2, 0)
        );
        assert_eq!(trigger.describe(), "cron '0 0 2 * * *'");
    }
}
