// Wall-clock sources for period arithmetic and the timer facility

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

/// Clock supplies "now" in the zone all period windows are computed in
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

/// Real wall clock rendered in a configured timezone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(chrono_tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Tz>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Tz>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.instant
    }
}

/// Wall clock derived from tokio's monotonic clock.
///
/// Reports `origin` plus the tokio time elapsed since construction, so it
/// follows `tokio::time::pause`/`advance` and lets a test walk a scheduler
/// through days of virtual time.
#[derive(Debug, Clone)]
pub struct InstantClock {
    origin: DateTime<Tz>,
    started: tokio::time::Instant,
}

impl InstantClock {
    pub fn new(origin: DateTime<Tz>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for InstantClock {
    fn now(&self) -> DateTime<Tz> {
        let elapsed = self.started.elapsed();
        let elapsed = Duration::from_std(elapsed).unwrap_or_else(|_| Duration::zero());
        self.origin + elapsed
    }
}
