// Processing periods of the requisition system (read-only)

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::store::{ProcessingPeriod, RequisitionPeriodSource};
use async_trait::async_trait;
use sqlx::Row;
use tracing::instrument;

pub struct ProcessingPeriodRepository {
    pool: DbPool,
}

impl ProcessingPeriodRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequisitionPeriodSource for ProcessingPeriodRepository {
    #[instrument(skip(self))]
    async fn last_requisition_period(&self) -> Result<Option<ProcessingPeriod>, DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT pp.id, pp.name, pp.start_date, pp.end_date
            FROM processing_periods pp
            WHERE EXISTS (
                SELECT 1 FROM requisitions r WHERE r.processing_period_id = pp.id
            )
            ORDER BY pp.end_date DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(ProcessingPeriod {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                start_date: row.try_get("start_date")?,
                end_date: row.try_get("end_date")?,
            })),
            None => Ok(None),
        }
    }
}
