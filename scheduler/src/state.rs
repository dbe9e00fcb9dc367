use common::scheduler::SchedulerRegistry;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SchedulerRegistry>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(registry: Arc<SchedulerRegistry>, metrics: Option<PrometheusHandle>) -> Self {
        Self { registry, metrics }
    }
}
