// Indicator computation against the logistics database

pub mod queries;

use crate::db::DbPool;
use crate::errors::IntegrationError;
use crate::models::DataSource;
use crate::period::PeriodWindow;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use tracing::{debug, instrument};

/// Computes one indicator value for one product at one facility
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndicatorEngine: Send + Sync {
    async fn compute(
        &self,
        source: DataSource,
        indicator: &str,
        window: &PeriodWindow,
        orderable_code: &str,
        unit_code: &str,
    ) -> Result<f64, IntegrationError>;
}

/// Calendar dates bounding `window` in the zone it was computed in.
///
/// Source tables are keyed by local date, so an offset inside the first day
/// keeps that day.
pub fn query_dates(window: &PeriodWindow) -> (NaiveDate, NaiveDate) {
    (window.start.date_naive(), window.end.date_naive())
}

/// Runs catalog queries on PostgreSQL
pub struct PgIndicatorEngine {
    pool: DbPool,
}

impl PgIndicatorEngine {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndicatorEngine for PgIndicatorEngine {
    #[instrument(skip(self, window), fields(start = %window.start, end = %window.end))]
    async fn compute(
        &self,
        source: DataSource,
        indicator: &str,
        window: &PeriodWindow,
        orderable_code: &str,
        unit_code: &str,
    ) -> Result<f64, IntegrationError> {
        let query =
            queries::find(source, indicator).ok_or_else(|| IntegrationError::UnknownIndicator {
                data_source: source.to_string(),
                indicator: indicator.to_string(),
            })?;

        let (start_date, end_date) = query_dates(window);
        let row = sqlx::query(query.sql)
            .bind(start_date)
            .bind(end_date)
            .bind(orderable_code)
            .bind(unit_code)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| IntegrationError::QueryFailed(e.to_string()))?;

        let value = match row {
            Some(row) => row
                .try_get::<Option<f64>, _>("value")
                .map_err(|e| IntegrationError::QueryFailed(e.to_string()))?
                .unwrap_or(0.0),
            None => 0.0,
        };

        debug!(value, %start_date, %end_date, "Indicator computed");
        Ok(value)
    }
}
