// Schedule repository: schedules with server, dataset and data element resolved

use crate::db::repositories::queries::schedule_queries;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{DataElement, DataSource, Dataset, Schedule, Server};
use crate::store::ScheduleStore;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

pub struct ScheduleRepository {
    pool: DbPool,
}

impl ScheduleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn schedule_from_row(row: &PgRow) -> Result<Schedule, DatabaseError> {
    let source: String = row.try_get("source")?;
    let source: DataSource = source.parse().map_err(DatabaseError::QueryFailed)?;

    let server = Server {
        id: row.try_get("server_id")?,
        name: row.try_get("server_name")?,
        url: row.try_get("server_url")?,
        username: row.try_get("server_username")?,
        password: row.try_get("server_password")?,
    };
    let dataset = Dataset {
        id: row.try_get("dataset_id")?,
        name: row.try_get("dataset_name")?,
        dhis_dataset_id: row.try_get("dhis_dataset_id")?,
        period: row.try_get("dataset_period")?,
        time_offset_minutes: row.try_get("dataset_time_offset_minutes")?,
        server_id: server.id,
    };
    let data_element = DataElement {
        id: row.try_get("data_element_id")?,
        name: row.try_get("data_element_name")?,
        source,
        indicator: row.try_get("indicator")?,
        code: row.try_get("code")?,
        category_option_combo: row.try_get("category_option_combo")?,
        dataset_id: dataset.id,
    };

    Ok(Schedule {
        id: row.try_get("schedule_id")?,
        period_enumerator: row.try_get("period_enumerator")?,
        time_offset_minutes: row.try_get("time_offset_minutes")?,
        server,
        dataset,
        data_element,
    })
}

#[async_trait]
impl ScheduleStore for ScheduleRepository {
    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Schedule>, DatabaseError> {
        let query = format!("{} ORDER BY s.created_at", schedule_queries::SELECT_JOINED);
        let rows = sqlx::query(&query).fetch_all(self.pool.pool()).await?;

        let schedules = rows
            .iter()
            .map(schedule_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = schedules.len(), "Loaded schedules");
        Ok(schedules)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>, DatabaseError> {
        let query = format!("{} WHERE s.id = $1", schedule_queries::SELECT_JOINED);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.as_ref().map(schedule_from_row).transpose()
    }
}
