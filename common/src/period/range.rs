// Effective reporting windows for a run, from a period name or a mapping

use crate::clock::{Clock, SystemClock};
use crate::dhis::PeriodTypeCatalog;
use crate::errors::{PeriodError, RunError};
use crate::models::{PeriodMapping, Server};
use crate::period::calculator::{format_boundary, local_midnight, window_for, PeriodWindow};
use crate::period::format::format_iso_pattern;
use crate::period::kind::PeriodKind;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::instrument;

/// Window of `kind` containing `now`, with the start pushed forward by
/// `offset_minutes`. The end is never shifted.
pub fn effective_window_at(
    kind: PeriodKind,
    offset_minutes: i32,
    now: &DateTime<Tz>,
) -> Result<PeriodWindow, PeriodError> {
    let window = window_for(kind, now)?;
    PeriodWindow::new(
        window.start + Duration::minutes(i64::from(offset_minutes)),
        window.end,
    )
}

/// Resolves period names and mappings into the window used by a run
#[derive(Clone)]
pub struct PeriodRangeService {
    clock: Arc<dyn Clock>,
}

impl PeriodRangeService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Service backed by the wall clock in `tz`
    pub fn system(tz: Tz) -> Self {
        Self::new(Arc::new(SystemClock::new(tz)))
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.clock.now()
    }

    /// Resolve a period name, ignoring case and separators
    pub fn resolve(&self, period: &str) -> Result<PeriodKind, PeriodError> {
        period.parse()
    }

    /// Effective window for a named period at the current instant
    pub fn effective_window(
        &self,
        period: &str,
        offset_minutes: i32,
    ) -> Result<PeriodWindow, PeriodError> {
        let kind = self.resolve(period)?;
        self.effective_window_for(kind, offset_minutes)
    }

    pub fn effective_window_for(
        &self,
        kind: PeriodKind,
        offset_minutes: i32,
    ) -> Result<PeriodWindow, PeriodError> {
        effective_window_at(kind, offset_minutes, &self.clock.now())
    }

    /// Window of an explicit mapping, taken verbatim (no offset)
    pub fn mapping_window(&self, mapping: &PeriodMapping) -> Result<PeriodWindow, PeriodError> {
        let tz = self.clock.now().timezone();
        PeriodWindow::new(
            local_midnight(&tz, mapping.start_date)?,
            local_midnight(&tz, mapping.end_date)?,
        )
    }

    /// Period code for a window boundary of a named period
    pub fn label(&self, boundary: &DateTime<Tz>, period: &str) -> Result<String, PeriodError> {
        format_boundary(boundary, self.resolve(period)?)
    }

    /// Period code for a mapping, formatted with the iso pattern of the period
    /// type the reporting server registers under `mapping.dhis_period`
    #[instrument(skip(self, catalog, server), fields(dhis_period = %mapping.dhis_period, server = %server.url))]
    pub async fn mapping_label(
        &self,
        mapping: &PeriodMapping,
        catalog: &dyn PeriodTypeCatalog,
        server: &Server,
    ) -> Result<String, RunError> {
        let period_type = catalog
            .lookup(
                &mapping.dhis_period,
                &server.url,
                &server.username,
                &server.password,
            )
            .await?;
        Ok(format_iso_pattern(
            mapping.start_date,
            &period_type.iso_format,
        )?)
    }
}

impl Default for PeriodRangeService {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock::default()))
    }
}
