// Storage collaborators the scheduling core reads configuration through

use crate::errors::DatabaseError;
use crate::models::{PeriodMapping, Schedule};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

/// Persisted schedule configuration, read-only from the scheduler's side
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Schedule>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>, DatabaseError>;
}

/// Operator-curated period overrides
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeriodMappingStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PeriodMapping>, DatabaseError>;
}

/// Processing period as recorded by the requisition system.
///
/// `end_date` is the last day of the period (inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingPeriod {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Source of the fallback window for requisition data without a mapping
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequisitionPeriodSource: Send + Sync {
    /// Latest processing period that has at least one requisition
    async fn last_requisition_period(&self) -> Result<Option<ProcessingPeriod>, DatabaseError>;
}
