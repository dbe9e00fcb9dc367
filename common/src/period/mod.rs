// Reporting period model: named period kinds, calendar windows and period codes

pub mod calculator;
pub mod format;
pub mod kind;
pub mod range;

pub use calculator::{format_boundary, window_for, PeriodWindow};
pub use format::format_iso_pattern;
pub use kind::PeriodKind;
pub use range::PeriodRangeService;
