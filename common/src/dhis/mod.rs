// Reporting API collaborators: data-point dispatch and period-type catalog

pub mod client;

pub use client::Dhis2Client;

use crate::errors::IntegrationError;
use crate::models::{DataPointSet, ImportSummary, PeriodType};
use async_trait::async_trait;

/// Pushes one data-point set to a reporting server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportingDispatch: Send + Sync {
    async fn send(
        &self,
        data_point_set: &DataPointSet,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<ImportSummary, IntegrationError>;
}

/// Period types registered on a reporting server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeriodTypeCatalog: Send + Sync {
    /// Period type named `name`, or `IntegrationError::PeriodTypeNotFound`
    async fn lookup(
        &self,
        name: &str,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<PeriodType, IntegrationError>;
}
