// Work performed once per firing of a schedule

use crate::dhis::{PeriodTypeCatalog, ReportingDispatch};
use crate::errors::{IntegrationError, RunError};
use crate::indicator::IndicatorEngine;
use crate::models::{DataPoint, DataPointSet, DataSource, ImportSummary, Schedule};
use crate::org_units::OrgUnitCache;
use crate::period::calculator::local_midnight;
use crate::period::{format_boundary, PeriodKind, PeriodRangeService, PeriodWindow};
use crate::store::{PeriodMappingStore, RequisitionPeriodSource};
use crate::telemetry;
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Step of the per-unit pipeline that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Compute,
    Dispatch,
}

impl FailureStage {
    fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Compute => "compute",
            FailureStage::Dispatch => "dispatch",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Sent {
        value: f64,
        summary: ImportSummary,
    },
    Failed {
        stage: FailureStage,
        kind: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitOutcome {
    pub org_unit: String,
    #[serde(flatten)]
    pub status: UnitStatus,
}

impl UnitOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self.status, UnitStatus::Sent { .. })
    }
}

/// Outcome of one run, one entry per attempted organisation unit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub schedule_id: Uuid,
    pub period: String,
    pub window: PeriodWindow,
    pub outcomes: Vec<UnitOutcome>,
}

impl RunReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }
}

/// Period code used when requisition data has no explicit mapping
const REQUISITION_FALLBACK_KIND: PeriodKind = PeriodKind::Monthly;

/// Computes and dispatches the data points of one schedule
pub struct ScheduleRunner {
    range: PeriodRangeService,
    mappings: Arc<dyn PeriodMappingStore>,
    requisition_periods: Arc<dyn RequisitionPeriodSource>,
    catalog: Arc<dyn PeriodTypeCatalog>,
    indicators: Arc<dyn IndicatorEngine>,
    dispatch: Arc<dyn ReportingDispatch>,
    org_units: OrgUnitCache,
}

impl ScheduleRunner {
    pub fn new(
        range: PeriodRangeService,
        mappings: Arc<dyn PeriodMappingStore>,
        requisition_periods: Arc<dyn RequisitionPeriodSource>,
        catalog: Arc<dyn PeriodTypeCatalog>,
        indicators: Arc<dyn IndicatorEngine>,
        dispatch: Arc<dyn ReportingDispatch>,
        org_units: OrgUnitCache,
    ) -> Self {
        Self {
            range,
            mappings,
            requisition_periods,
            catalog,
            indicators,
            dispatch,
            org_units,
        }
    }

    pub fn range(&self) -> &PeriodRangeService {
        &self.range
    }

    /// Timer-driven run over every cached organisation unit
    pub async fn run(&self, schedule: &Schedule) -> Result<RunReport, RunError> {
        self.run_with(schedule, None, None).await
    }

    /// Run with an optional period mapping and an optional facility filter
    #[instrument(
        skip(self, schedule, facility_codes),
        fields(
            schedule_id = %schedule.id,
            dataset = %schedule.dataset.dhis_dataset_id,
            data_element = %schedule.data_element.code
        )
    )]
    pub async fn run_with(
        &self,
        schedule: &Schedule,
        period_mapping_id: Option<Uuid>,
        facility_codes: Option<&[String]>,
    ) -> Result<RunReport, RunError> {
        let started = Instant::now();
        telemetry::record_run_started(&schedule.id);

        let (window, period) = self.resolve_period(schedule, period_mapping_id).await?;
        let units = self.target_units(facility_codes).await;
        info!(
            period = %period,
            start = %window.start,
            end = %window.end,
            org_units = units.len(),
            "Running schedule"
        );

        let mut outcomes = Vec::with_capacity(units.len());
        for unit in &units {
            outcomes.push(self.run_unit(schedule, &window, &period, unit).await);
        }

        telemetry::record_run_duration(&schedule.id, started.elapsed().as_secs_f64());
        let report = RunReport {
            schedule_id: schedule.id,
            period,
            window,
            outcomes,
        };
        info!(
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Schedule run finished"
        );
        Ok(report)
    }

    /// Reporting window and its period code
    async fn resolve_period(
        &self,
        schedule: &Schedule,
        period_mapping_id: Option<Uuid>,
    ) -> Result<(PeriodWindow, String), RunError> {
        match (schedule.data_element.source, period_mapping_id) {
            (DataSource::Requisition, Some(mapping_id)) => {
                let mapping = self
                    .mappings
                    .find_by_id(mapping_id)
                    .await?
                    .ok_or(RunError::PeriodMappingNotFound(mapping_id))?;
                let window = self.range.mapping_window(&mapping)?;
                let period = self
                    .range
                    .mapping_label(&mapping, self.catalog.as_ref(), &schedule.server)
                    .await?;
                Ok((window, period))
            }
            (DataSource::Requisition, None) => {
                let last = self
                    .requisition_periods
                    .last_requisition_period()
                    .await?
                    .ok_or(RunError::NoRequisitionPeriod)?;
                let tz = self.range.now().timezone();
                let window = PeriodWindow::new(
                    local_midnight(&tz, last.start_date)?,
                    local_midnight(&tz, last.end_date + Duration::days(1))?,
                )?;
                let period = format_boundary(&window.start, REQUISITION_FALLBACK_KIND)?;
                debug!(processing_period = %last.name, "Using last requisition period");
                Ok((window, period))
            }
            (DataSource::StockBased, _) => {
                let dataset = &schedule.dataset;
                let window = self
                    .range
                    .effective_window(&dataset.period, dataset.time_offset_minutes)?;
                let period = self.range.label(&window.start, &dataset.period)?;
                Ok((window, period))
            }
        }
    }

    /// Cached units, narrowed to `facility_codes` when given
    async fn target_units(&self, facility_codes: Option<&[String]>) -> Vec<String> {
        let cached = self.org_units.current_codes().await;
        match facility_codes {
            Some(filter) => cached
                .iter()
                .filter(|code| filter.contains(code))
                .cloned()
                .collect(),
            None => cached.as_ref().clone(),
        }
    }

    /// Compute and dispatch for one unit; failures stay inside the outcome
    async fn run_unit(
        &self,
        schedule: &Schedule,
        window: &PeriodWindow,
        period: &str,
        unit: &str,
    ) -> UnitOutcome {
        let element = &schedule.data_element;
        let value = match self
            .indicators
            .compute(element.source, &element.indicator, window, &element.code, unit)
            .await
        {
            Ok(value) => value,
            Err(e) => return self.failed(schedule, unit, FailureStage::Compute, e),
        };

        let data_point_set = DataPointSet {
            data_set: schedule.dataset.dhis_dataset_id.clone(),
            period: period.to_string(),
            org_unit: unit.to_string(),
            data_values: vec![DataPoint {
                data_element: element.code.clone(),
                category_option_combo: element.category_option_combo.clone(),
                value,
            }],
        };

        let server = &schedule.server;
        match self
            .dispatch
            .send(&data_point_set, &server.url, &server.username, &server.password)
            .await
        {
            Ok(summary) => {
                telemetry::record_data_point_sent(&schedule.id);
                debug!(org_unit = unit, value, status = %summary.status, "Data point sent");
                UnitOutcome {
                    org_unit: unit.to_string(),
                    status: UnitStatus::Sent { value, summary },
                }
            }
            Err(e) => self.failed(schedule, unit, FailureStage::Dispatch, e),
        }
    }

    fn failed(
        &self,
        schedule: &Schedule,
        unit: &str,
        stage: FailureStage,
        error: IntegrationError,
    ) -> UnitOutcome {
        warn!(
            org_unit = unit,
            stage = stage.as_str(),
            error = %error,
            "Organisation unit failed, continuing with the next one"
        );
        telemetry::record_data_point_failed(
            &schedule.id,
            &format!("{}:{}", stage.as_str(), error.kind()),
        );
        UnitOutcome {
            org_unit: unit.to_string(),
            status: UnitStatus::Failed {
                stage,
                kind: error.kind().to_string(),
                error: error.to_string(),
            },
        }
    }
}
