use axum::{
    extract::{Path, State},
    Json,
};
use common::errors::{ApiError, RunError};
use common::models::Schedule;
use common::runner::RunReport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub period_mapping_id: Option<Uuid>,
    #[serde(default)]
    pub facility_codes: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub schedule_id: Uuid,
    /// False when nothing changed: already registered, or already gone
    pub changed: bool,
}

async fn load_schedule(state: &AppState, id: Uuid) -> Result<Schedule, ErrorResponse> {
    state
        .registry
        .schedules()
        .find_by_id(id)
        .await
        .map_err(|e| ErrorResponse::from(ApiError::from(e)))?
        .ok_or_else(|| ApiError::from(RunError::ScheduleNotFound(id)).into())
}

/// Ids of schedules with a live timer
#[tracing::instrument(skip(state))]
pub async fn list_schedules(State(state): State<AppState>) -> SuccessResponse<Vec<Uuid>> {
    SuccessResponse::new(state.registry.registered_ids().await)
}

/// Load a persisted schedule and start its timer
#[tracing::instrument(skip(state))]
pub async fn register_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SuccessResponse<RegistrationResponse>, ErrorResponse> {
    let schedule = load_schedule(&state, id).await?;
    let changed = state
        .registry
        .register(&schedule)
        .await
        .map_err(|e| ErrorResponse::new("configuration_error", e.to_string()))?;

    Ok(SuccessResponse::new(RegistrationResponse {
        schedule_id: id,
        changed,
    }))
}

/// Stop the timer of a schedule; unknown ids succeed
#[tracing::instrument(skip(state))]
pub async fn deregister_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> SuccessResponse<RegistrationResponse> {
    let changed = state.registry.deregister(id).await;
    SuccessResponse::new(RegistrationResponse {
        schedule_id: id,
        changed,
    })
}

/// Run a schedule now, optionally for a period mapping and a subset of facilities
#[tracing::instrument(skip(state, request))]
pub async fn run_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RunRequest>,
) -> Result<SuccessResponse<RunReport>, ErrorResponse> {
    let schedule = load_schedule(&state, id).await?;
    let report = state
        .registry
        .runner()
        .run_with(
            &schedule,
            request.period_mapping_id,
            request.facility_codes.as_deref(),
        )
        .await
        .map_err(|e| ErrorResponse::from(ApiError::from(e)))?;

    Ok(SuccessResponse::new(report))
}
