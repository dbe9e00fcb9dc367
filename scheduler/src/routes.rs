use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the control router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .route("/api/schedules", get(handlers::schedules::list_schedules))
        .route(
            "/api/schedules/:id/register",
            post(handlers::schedules::register_schedule),
        )
        .route(
            "/api/schedules/:id",
            delete(handlers::schedules::deregister_schedule),
        )
        .route(
            "/api/schedules/:id/run",
            post(handlers::schedules::run_schedule),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
