// Calendar window computation for period kinds
//
// Windows are half-open [start, end) and both boundaries sit on local
// midnight in the zone of the `now` they were computed from.

use crate::errors::PeriodError;
use crate::period::format::format_iso_pattern;
use crate::period::kind::PeriodKind;
use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

/// Half-open reporting interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl PeriodWindow {
    /// Build a window, rejecting empty or inverted ranges
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Result<Self, PeriodError> {
        if start >= end {
            return Err(PeriodError::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        self.start <= *instant && *instant < self.end
    }
}

/// First instant of `date` in `tz`.
///
/// An ambiguous midnight resolves to the earlier instant; a midnight skipped by
/// a DST gap resolves to the first valid minute after it.
pub fn local_midnight(tz: &Tz, date: NaiveDate) -> Result<DateTime<Tz>, PeriodError> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(instant) => Ok(instant),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => (1..=24 * 60)
            .find_map(|minute| {
                tz.from_local_datetime(&(midnight + Duration::minutes(minute)))
                    .earliest()
            })
            .ok_or_else(|| PeriodError::InvalidLocalMidnight {
                date: date.to_string(),
                timezone: tz.name().to_string(),
            }),
    }
}

fn shift_days(date: NaiveDate, days: i64) -> Result<NaiveDate, PeriodError> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| PeriodError::InvalidWindow {
            start: date.to_string(),
            end: format!("{} days later", days),
        })
}

/// Most recent date on or before `date` that falls on `weekday`
fn previous_or_same(date: NaiveDate, weekday: Weekday) -> Result<NaiveDate, PeriodError> {
    let back = (date.weekday().num_days_from_monday() + 7 - weekday.num_days_from_monday()) % 7;
    shift_days(date, -i64::from(back))
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Calendar window of `kind` that contains `now`.
///
/// Weekly windows start on the previous-or-same occurrence of their weekday and
/// span exactly seven calendar days, so an instant at midnight on the weekday
/// opens a new window rather than closing the old one.
pub fn window_for(kind: PeriodKind, now: &DateTime<Tz>) -> Result<PeriodWindow, PeriodError> {
    let tz = now.timezone();
    let today = now.date_naive();

    let (start_date, end_date) = match kind {
        PeriodKind::Daily => (today, shift_days(today, 1)?),
        PeriodKind::Weekly(weekday) => {
            let start = previous_or_same(today, weekday)?;
            (start, shift_days(start, 7)?)
        }
        PeriodKind::Monthly => {
            let first = today.with_day(1).ok_or_else(|| PeriodError::InvalidWindow {
                start: today.to_string(),
                end: "first of month".to_string(),
            })?;
            let next = first_of_next_month(first).ok_or_else(|| PeriodError::InvalidWindow {
                start: first.to_string(),
                end: "first of next month".to_string(),
            })?;
            (first, next)
        }
    };

    PeriodWindow::new(
        local_midnight(&tz, start_date)?,
        local_midnight(&tz, end_date)?,
    )
}

/// Period code for the window boundary `instant` in the notation owned by `kind`
pub fn format_boundary(instant: &DateTime<Tz>, kind: PeriodKind) -> Result<String, PeriodError> {
    format_iso_pattern(instant.date_naive(), kind.pattern())
}
