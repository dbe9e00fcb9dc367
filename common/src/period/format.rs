// Rendering of dates into the reporting API's period codes.
//
// Patterns use the API's iso notation: `yyyy`, `MM`, `dd`, `Wn` (week number),
// `Qn` (quarter), `Sn` (six-month) and an optional three-letter weekday that
// keys weekly periods starting on a day other than Monday (`yyyyWedWn`).

use crate::errors::PeriodError;
use crate::period::kind::{weekday_abbreviation, WEEKDAYS};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year,
    Month,
    Day,
    Week,
    Quarter,
    SixMonth,
    WeekStart(Weekday),
}

fn tokenize(pattern: &str) -> Result<Vec<Token>, PeriodError> {
    const FIXED: [(&str, Token); 6] = [
        ("yyyy", Token::Year),
        ("MM", Token::Month),
        ("dd", Token::Day),
        ("Wn", Token::Week),
        ("Qn", Token::Quarter),
        ("Sn", Token::SixMonth),
    ];

    let mut tokens = Vec::new();
    let mut rest = pattern;

    while !rest.is_empty() {
        let current: &str = rest;
        let matched = FIXED
            .iter()
            .find_map(|(text, token)| current.strip_prefix(text).map(|r| (*token, r)))
            .or_else(|| {
                WEEKDAYS.iter().find_map(|wd| {
                    current
                        .strip_prefix(weekday_abbreviation(*wd))
                        .map(|r| (Token::WeekStart(*wd), r))
                })
            });

        match matched {
            Some((token, remaining)) => {
                tokens.push(token);
                rest = remaining;
            }
            None => return Err(PeriodError::UnsupportedIsoFormat(pattern.to_string())),
        }
    }

    if tokens.is_empty() {
        return Err(PeriodError::UnsupportedIsoFormat(pattern.to_string()));
    }
    Ok(tokens)
}

/// Week-based year and week number for weeks beginning on `week_start`.
///
/// Week 1 is the first week whose fourth day falls in the year, which is the
/// ISO-8601 rule when `week_start` is Monday.
pub fn week_of(date: NaiveDate, week_start: Weekday) -> (i32, u32) {
    let offset = (date.weekday().num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7;
    let anchor = date - Duration::days(i64::from(offset)) + Duration::days(3);
    (anchor.year(), anchor.ordinal0() / 7 + 1)
}

/// Render `date` with an iso period pattern such as `yyyyMM` or `yyyySunWn`
pub fn format_iso_pattern(date: NaiveDate, pattern: &str) -> Result<String, PeriodError> {
    let tokens = tokenize(pattern)?;

    let week_start = tokens
        .iter()
        .find_map(|t| match t {
            Token::WeekStart(wd) => Some(*wd),
            _ => None,
        })
        .unwrap_or(Weekday::Mon);
    let weekly = tokens.contains(&Token::Week);
    let (week_year, week) = week_of(date, week_start);

    let mut out = String::with_capacity(pattern.len() + 2);
    for token in tokens {
        match token {
            Token::Year if weekly => out.push_str(&format!("{:04}", week_year)),
            Token::Year => out.push_str(&format!("{:04}", date.year())),
            Token::Month => out.push_str(&format!("{:02}", date.month())),
            Token::Day => out.push_str(&format!("{:02}", date.day())),
            Token::Week => out.push_str(&format!("W{}", week)),
            Token::Quarter => out.push_str(&format!("Q{}", (date.month0() / 3) + 1)),
            Token::SixMonth => out.push_str(&format!("S{}", (date.month0() / 6) + 1)),
            Token::WeekStart(wd) => out.push_str(weekday_abbreviation(wd)),
        }
    }
    Ok(out)
}
