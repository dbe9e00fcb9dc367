// Period mapping repository

use crate::db::repositories::queries::period_mapping_queries;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::PeriodMapping;
use crate::store::PeriodMappingStore;
use async_trait::async_trait;
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

pub struct PeriodMappingRepository {
    pool: DbPool,
}

impl PeriodMappingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PeriodMappingStore for PeriodMappingRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PeriodMapping>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM period_mappings WHERE id = $1",
            period_mapping_queries::SELECT_ALL_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        match row {
            Some(row) => Ok(Some(PeriodMapping {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                source: row.try_get("source")?,
                dhis_period: row.try_get("dhis_period")?,
                processing_period_id: row.try_get("processing_period_id")?,
                start_date: row.try_get("start_date")?,
                end_date: row.try_get("end_date")?,
            })),
            None => Ok(None),
        }
    }
}
