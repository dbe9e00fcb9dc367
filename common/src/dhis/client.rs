// HTTP client for the reporting API

use crate::dhis::{PeriodTypeCatalog, ReportingDispatch};
use crate::errors::IntegrationError;
use crate::models::{DataPointSet, ImportSummary, PeriodType};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DATA_VALUE_SETS_PATH: &str = "/api/dataValueSets";
const PERIOD_TYPES_PATH: &str = "/api/periodTypes";
const ORGANISATION_UNITS_PATH: &str = "/api/organisationUnits";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodTypesResponse {
    period_types: Vec<PeriodType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganisationUnit {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganisationUnitsResponse {
    organisation_units: Vec<OrganisationUnit>,
}

/// Client for one or more reporting servers, authenticated per call
#[derive(Debug, Clone)]
pub struct Dhis2Client {
    client: Client,
}

fn endpoint(server_url: &str, path: &str) -> String {
    format!("{}{}", server_url.trim_end_matches('/'), path)
}

/// Import summaries come either bare or wrapped in a web message envelope
fn parse_import_summary(body: &str) -> Result<ImportSummary, IntegrationError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| IntegrationError::UnparseableResponse(format!("{}: {}", e, body)))?;
    let summary = match value.get("response") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => value,
    };
    serde_json::from_value(summary)
        .map_err(|e| IntegrationError::UnparseableResponse(format!("{}: {}", e, body)))
}

impl Dhis2Client {
    /// Create a new client with the specified timeout
    pub fn new(timeout_seconds: u64) -> Result<Self, IntegrationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| {
                IntegrationError::ConnectionFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Reject non-success statuses, keeping the body for diagnostics
    async fn check_status(response: Response) -> Result<Response, IntegrationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(IntegrationError::ClientError {
            status: status.as_u16(),
            body,
        })
    }

    /// Codes of every organisation unit known to the server
    #[instrument(skip(self, password))]
    pub async fn organisation_unit_codes(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Vec<String>, IntegrationError> {
        let response = self
            .client
            .get(endpoint(server_url, ORGANISATION_UNITS_PATH))
            .query(&[("paging", "false"), ("fields", "code")])
            .basic_auth(username, Some(password))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let units: OrganisationUnitsResponse = response.json().await?;

        let codes: Vec<String> = units
            .organisation_units
            .into_iter()
            .filter_map(|unit| unit.code)
            .collect();
        debug!(count = codes.len(), "Fetched organisation unit codes");
        Ok(codes)
    }
}

#[async_trait]
impl ReportingDispatch for Dhis2Client {
    #[instrument(
        skip(self, data_point_set, password),
        fields(org_unit = %data_point_set.org_unit, period = %data_point_set.period)
    )]
    async fn send(
        &self,
        data_point_set: &DataPointSet,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<ImportSummary, IntegrationError> {
        let url = endpoint(server_url, DATA_VALUE_SETS_PATH);
        debug!(
            url = %url,
            payload = %serde_json::to_string(data_point_set).unwrap_or_default(),
            "Sending data point set"
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(username, Some(password))
            .json(data_point_set)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, body = %body, "Reporting server response");

        if !status.is_success() {
            warn!(status = %status, "Data point set rejected");
            return Err(IntegrationError::ClientError {
                status: status.as_u16(),
                body,
            });
        }

        let summary = parse_import_summary(&body)?;
        info!(
            status = %summary.status,
            imported = summary.import_count.imported,
            updated = summary.import_count.updated,
            ignored = summary.import_count.ignored,
            "Data point set dispatched"
        );
        Ok(summary)
    }
}

#[async_trait]
impl PeriodTypeCatalog for Dhis2Client {
    #[instrument(skip(self, password))]
    async fn lookup(
        &self,
        name: &str,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<PeriodType, IntegrationError> {
        let response = self
            .client
            .get(endpoint(server_url, PERIOD_TYPES_PATH))
            .query(&[("fields", "name,isoFormat,frequencyOrder")])
            .basic_auth(username, Some(password))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let catalog: PeriodTypesResponse = response.json().await?;

        catalog
            .period_types
            .into_iter()
            .find(|period_type| period_type.name == name)
            .ok_or_else(|| IntegrationError::PeriodTypeNotFound(name.to_string()))
    }
}
