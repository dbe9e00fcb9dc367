use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Configuration Models
// ============================================================================

/// Reporting server the computed data points are pushed to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// Dataset on the reporting server, reported on one period kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    /// Dataset identifier on the reporting server
    pub dhis_dataset_id: String,
    /// Period kind name, e.g. `MONTHLY` or `WEEKLY_MONDAY`
    pub period: String,
    pub time_offset_minutes: i32,
    pub server_id: Uuid,
}

/// Internal source an indicator is computed from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Requisition,
    StockBased,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Requisition => "requisition",
            DataSource::StockBased => "stock_based",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "requisition" => Ok(DataSource::Requisition),
            "stock_based" | "stock" => Ok(DataSource::StockBased),
            other => Err(format!("Unknown data source '{}'", other)),
        }
    }
}

/// Data element of a dataset: which indicator to compute for which product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataElement {
    pub id: Uuid,
    pub name: String,
    pub source: DataSource,
    pub indicator: String,
    /// Orderable code, also the data element identifier on the reporting server
    pub code: String,
    pub category_option_combo: String,
    pub dataset_id: Uuid,
}

/// Binding of one dataset/data-element pair to a period kind and offset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub id: Uuid,
    pub period_enumerator: String,
    pub time_offset_minutes: i32,
    pub server: Server,
    pub dataset: Dataset,
    pub data_element: DataElement,
}

/// Explicit period override curated by an operator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodMapping {
    pub id: Uuid,
    pub name: String,
    pub source: String,
    /// Period type name in the reporting server's catalog, e.g. `Monthly`
    pub dhis_period: String,
    pub processing_period_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

// ============================================================================
// Reporting API Models
// ============================================================================

/// One computed value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub data_element: String,
    pub category_option_combo: String,
    pub value: f64,
}

/// Payload pushed to the reporting API for one organizational unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataPointSet {
    pub data_set: String,
    pub period: String,
    pub org_unit: String,
    pub data_values: Vec<DataPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportCount {
    #[serde(default)]
    pub imported: u32,
    #[serde(default)]
    pub updated: u32,
    #[serde(default)]
    pub ignored: u32,
    #[serde(default)]
    pub deleted: u32,
}

/// Import summary returned by the reporting API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub status: String,
    #[serde(default)]
    pub import_count: ImportCount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Period type entry of the reporting server's catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodType {
    pub name: String,
    pub iso_format: String,
    #[serde(default)]
    pub frequency_order: Option<u32>,
}
