// Error handling framework
// Configuration errors abort a run, integration errors are isolated per unit.

use thiserror::Error;
use uuid::Uuid;

/// Calendar and period-resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Unknown period '{0}'")]
    UnknownPeriod(String),

    #[error("No valid local midnight for {date} in {timezone}")]
    InvalidLocalMidnight { date: String, timezone: String },

    #[error("Unsupported period iso format '{0}'")]
    UnsupportedIsoFormat(String),

    #[error("Invalid period window: start {start} is not before end {end}")]
    InvalidWindow { start: String, end: String },

    #[error("Offset of {offset_minutes} minutes does not fit every {period} window (limit {limit_minutes})")]
    OffsetTooLarge {
        period: String,
        offset_minutes: i32,
        limit_minutes: i32,
    },
}

/// Schedule-related errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Trigger for '{name}' did not advance: next fire time {next} is not after {now}")]
    NonAdvancingTrigger {
        name: String,
        next: String,
        now: String,
    },

    #[error("No next execution time available for {schedule_type} schedule")]
    NoNextExecution { schedule_type: String },

    #[error(transparent)]
    Period(#[from] PeriodError),
}

/// Errors raised by external collaborators (reporting API, reference data, indicator store)
#[derive(Error, Debug, Clone)]
pub enum IntegrationError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request rejected with status {status}: {body}")]
    ClientError { status: u16, body: String },

    #[error("Unparseable response: {0}")]
    UnparseableResponse(String),

    #[error("Period type not found: {0}")]
    PeriodTypeNotFound(String),

    #[error("Unknown indicator '{indicator}' for source '{data_source}'")]
    UnknownIndicator {
        data_source: String,
        indicator: String,
    },

    #[error("Indicator query failed: {0}")]
    QueryFailed(String),
}

impl IntegrationError {
    /// Short label used as a metrics dimension
    pub fn kind(&self) -> &'static str {
        match self {
            IntegrationError::ConnectionFailed(_) => "connection_failed",
            IntegrationError::ClientError { .. } => "client_error",
            IntegrationError::UnparseableResponse(_) => "unparseable_response",
            IntegrationError::PeriodTypeNotFound(_) => "period_type_not_found",
            IntegrationError::UnknownIndicator { .. } => "unknown_indicator",
            IntegrationError::QueryFailed(_) => "query_failed",
        }
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IntegrationError::UnparseableResponse(err.to_string())
        } else if let Some(status) = err.status() {
            IntegrationError::ClientError {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            IntegrationError::ConnectionFailed(err.to_string())
        }
    }
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Errors that abort a whole schedule run before any unit is attempted
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(Uuid),

    #[error("Period mapping not found: {0}")]
    PeriodMappingNotFound(Uuid),

    #[error("No processing period with a requisition found")]
    NoRequisitionPeriod,

    #[error(transparent)]
    Period(#[from] PeriodError),

    #[error("Failed to resolve reporting period: {0}")]
    PeriodResolution(#[from] IntegrationError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        let code = match err {
            RunError::ScheduleNotFound(_)
            | RunError::PeriodMappingNotFound(_)
            | RunError::NoRequisitionPeriod => "NOT_FOUND",
            RunError::Storage(DatabaseError::NotFound(_)) => "NOT_FOUND",
            RunError::Storage(_) => "STORAGE_ERROR",
            RunError::Period(_) | RunError::PeriodResolution(_) => "CONFIGURATION_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        let code = match err {
            DatabaseError::NotFound(_) => "NOT_FOUND",
            _ => "STORAGE_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => DatabaseError::QueryFailed(db_err.message().to_string()),
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}
