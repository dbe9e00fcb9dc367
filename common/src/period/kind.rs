use crate::errors::PeriodError;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named recurrence rule a dataset is reported on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PeriodKind {
    Daily,
    Weekly(Weekday),
    Monthly,
}

pub(crate) const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Three-letter abbreviation used in weekday-keyed period codes
pub(crate) fn weekday_abbreviation(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

impl PeriodKind {
    /// Every supported kind, in a stable order
    pub fn all() -> impl Iterator<Item = PeriodKind> {
        std::iter::once(PeriodKind::Daily)
            .chain(WEEKDAYS.iter().map(|d| PeriodKind::Weekly(*d)))
            .chain(std::iter::once(PeriodKind::Monthly))
    }

    /// Canonical name, e.g. `DAILY`, `WEEKLY_WEDNESDAY`, `MONTHLY`
    pub fn name(&self) -> String {
        match self {
            PeriodKind::Daily => "DAILY".to_string(),
            PeriodKind::Weekly(day) => format!("WEEKLY_{}", weekday_name(*day)),
            PeriodKind::Monthly => "MONTHLY".to_string(),
        }
    }

    /// Length of the shortest window of this kind, allowing for a daylight
    /// saving hour lost inside it. February bounds the monthly kind.
    pub fn shortest_window_minutes(&self) -> i32 {
        match self {
            PeriodKind::Daily => 23 * 60,
            PeriodKind::Weekly(_) => (7 * 24 - 1) * 60,
            PeriodKind::Monthly => (28 * 24 - 1) * 60,
        }
    }

    /// Period-code pattern in the reporting API's iso notation
    pub fn pattern(&self) -> &'static str {
        match self {
            PeriodKind::Daily => "yyyyMMdd",
            PeriodKind::Weekly(Weekday::Mon) => "yyyyWn",
            PeriodKind::Weekly(Weekday::Tue) => "yyyyTueWn",
            PeriodKind::Weekly(Weekday::Wed) => "yyyyWedWn",
            PeriodKind::Weekly(Weekday::Thu) => "yyyyThuWn",
            PeriodKind::Weekly(Weekday::Fri) => "yyyyFriWn",
            PeriodKind::Weekly(Weekday::Sat) => "yyyySatWn",
            PeriodKind::Weekly(Weekday::Sun) => "yyyySunWn",
            PeriodKind::Monthly => "yyyyMM",
        }
    }
}

/// Upper-case and strip separators so `weekly monday`, `Weekly-Monday` and
/// `WEEKLY_MONDAY` compare equal
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_uppercase())
        .collect()
}

impl FromStr for PeriodKind {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "DAILY" => return Ok(PeriodKind::Daily),
            "MONTHLY" => return Ok(PeriodKind::Monthly),
            "WEEKLY" => return Ok(PeriodKind::Weekly(Weekday::Mon)),
            _ => {}
        }

        normalized
            .strip_prefix("WEEKLY")
            .and_then(|day| {
                WEEKDAYS.iter().copied().find(|wd| {
                    day == weekday_name(*wd) || day == weekday_abbreviation(*wd).to_uppercase()
                })
            })
            .map(PeriodKind::Weekly)
            .ok_or_else(|| PeriodError::UnknownPeriod(s.to_string()))
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl TryFrom<String> for PeriodKind {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKind> for String {
    fn from(kind: PeriodKind) -> Self {
        kind.name()
    }
}
