// Period scheduler entry point

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

mod handlers;
mod routes;
mod state;

use common::config::Settings;
use common::db::repositories::{
    PeriodMappingRepository, ProcessingPeriodRepository, ScheduleRepository,
};
use common::db::DbPool;
use common::dhis::Dhis2Client;
use common::indicator::PgIndicatorEngine;
use common::org_units::{HttpOrgUnitSync, OrgUnitCache, OrgUnitSync};
use common::period::PeriodRangeService;
use common::runner::ScheduleRunner;
use common::schedule::parse_timezone;
use common::scheduler::{refresh_once, SchedulerRegistry};
use common::store::ScheduleStore;
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    let metrics_handle = telemetry::init_metrics()?;

    tracing::info!(
        host = %settings.server.host,
        port = %settings.server.port,
        timezone = %settings.scheduler.timezone,
        "Starting period scheduler"
    );

    // Initialize database connection pool
    let db_pool = DbPool::new(&settings.database).await?;
    if settings.database.run_migrations {
        db_pool.run_migrations().await?;
        tracing::info!("Database migrations applied");
    }

    let dhis = Dhis2Client::new(settings.http.timeout_seconds)?;
    let schedules: Arc<dyn ScheduleStore> = Arc::new(ScheduleRepository::new(db_pool.clone()));

    let tz = parse_timezone(&settings.scheduler.timezone)?;
    let org_units = OrgUnitCache::new();
    let sync: Arc<dyn OrgUnitSync> = Arc::new(HttpOrgUnitSync::new(
        &settings.reference_data.url,
        &settings.reference_data.token,
        settings.http.timeout_seconds,
        dhis.clone(),
        schedules.clone(),
        org_units.clone(),
    )?);
    if settings.scheduler.refresh_on_startup {
        refresh_once(sync.as_ref()).await;
    }

    let dhis = Arc::new(dhis);
    let runner = ScheduleRunner::new(
        PeriodRangeService::system(tz),
        Arc::new(PeriodMappingRepository::new(db_pool.clone())),
        Arc::new(ProcessingPeriodRepository::new(db_pool.clone())),
        dhis.clone(),
        Arc::new(PgIndicatorEngine::new(db_pool.clone())),
        dhis,
        org_units,
    );
    let registry = Arc::new(SchedulerRegistry::new(Arc::new(runner), schedules));

    let registered = registry.recreate_all().await?;
    registry
        .start_daily_refresh(sync, &settings.scheduler.refresh_cron)
        .await?;
    tracing::info!(registered, "Schedules registered");

    // Create router
    let app = routes::create_router(AppState::new(registry.clone(), Some(metrics_handle)));

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    tracing::info!(addr = %addr, "Starting control server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    db_pool.close().await;
    telemetry::shutdown_tracer();

    tracing::info!("Period scheduler stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
