// Registry of live schedule timers

use crate::errors::{DatabaseError, ScheduleError};
use crate::models::Schedule;
use crate::org_units::OrgUnitSync;
use crate::runner::ScheduleRunner;
use crate::schedule::RecomputingTrigger;
use crate::scheduler::refresh::spawn_daily_refresh;
use crate::scheduler::timer::{spawn_timer, TimerHandle, TimerJob};
use crate::store::ScheduleStore;
use crate::telemetry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Timer job running one schedule; run errors are logged, never escalated
fn schedule_job(runner: Arc<ScheduleRunner>, schedule: Arc<Schedule>) -> TimerJob {
    Arc::new(move || {
        let runner = runner.clone();
        let schedule = schedule.clone();
        Box::pin(async move {
            match runner.run(&schedule).await {
                Ok(report) if report.failed() > 0 => warn!(
                    schedule_id = %schedule.id,
                    period = %report.period,
                    attempted = report.attempted(),
                    failed = report.failed(),
                    "Scheduled run finished with failures"
                ),
                Ok(report) => debug!(
                    schedule_id = %schedule.id,
                    period = %report.period,
                    attempted = report.attempted(),
                    "Scheduled run finished"
                ),
                Err(e) => error!(schedule_id = %schedule.id, error = %e, "Scheduled run aborted"),
            }
        })
    })
}

/// Owns one timer per registered schedule plus the daily refresh timer
pub struct SchedulerRegistry {
    runner: Arc<ScheduleRunner>,
    schedules: Arc<dyn ScheduleStore>,
    timers: Mutex<HashMap<Uuid, TimerHandle>>,
    refresh: Mutex<Option<TimerHandle>>,
}

impl SchedulerRegistry {
    pub fn new(runner: Arc<ScheduleRunner>, schedules: Arc<dyn ScheduleStore>) -> Self {
        Self {
            runner,
            schedules,
            timers: Mutex::new(HashMap::new()),
            refresh: Mutex::new(None),
        }
    }

    pub fn runner(&self) -> Arc<ScheduleRunner> {
        self.runner.clone()
    }

    pub fn schedules(&self) -> Arc<dyn ScheduleStore> {
        self.schedules.clone()
    }

    /// Start a timer for `schedule` unless one is already live for its id.
    ///
    /// Returns `Ok(false)` when the schedule was already registered.
    #[instrument(skip(self, schedule), fields(schedule_id = %schedule.id, period = %schedule.period_enumerator))]
    pub async fn register(&self, schedule: &Schedule) -> Result<bool, ScheduleError> {
        let mut timers = self.timers.lock().await;
        if let Some(existing) = timers.get(&schedule.id) {
            if !existing.is_finished() {
                debug!("Schedule already registered");
                return Ok(false);
            }
            warn!("Replacing stopped timer");
        }

        let range = self.runner.range().clone();
        let clock = range.clock();
        let trigger = RecomputingTrigger::new(
            &schedule.period_enumerator,
            schedule.time_offset_minutes,
            range,
        )?;
        let handle = spawn_timer(
            format!("schedule:{}", schedule.id),
            Arc::new(trigger),
            clock,
            schedule_job(self.runner.clone(), Arc::new(schedule.clone())),
        );

        timers.insert(schedule.id, handle);
        telemetry::update_registered_schedules(timers.len());
        info!("Schedule registered");
        Ok(true)
    }

    /// Cancel the timer of `schedule_id`. Unknown ids are not an error.
    #[instrument(skip(self))]
    pub async fn deregister(&self, schedule_id: Uuid) -> bool {
        let mut timers = self.timers.lock().await;
        let removed = timers.remove(&schedule_id);
        telemetry::update_registered_schedules(timers.len());

        match removed {
            Some(handle) => {
                handle.cancel();
                info!("Schedule deregistered");
                true
            }
            None => {
                debug!("Schedule was not registered");
                false
            }
        }
    }

    /// Register every persisted schedule, returning how many were registered.
    ///
    /// A schedule with an invalid period is logged and skipped.
    #[instrument(skip(self))]
    pub async fn recreate_all(&self) -> Result<usize, DatabaseError> {
        let schedules = self.schedules.find_all().await?;
        let total = schedules.len();

        let mut registered = 0;
        for schedule in &schedules {
            match self.register(schedule).await {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => error!(
                    schedule_id = %schedule.id,
                    error = %e,
                    "Failed to register schedule"
                ),
            }
        }

        info!(total, registered, "Schedules recreated");
        Ok(registered)
    }

    /// Start the daily organisation-unit refresh, replacing a previous one
    #[instrument(skip(self, sync))]
    pub async fn start_daily_refresh(
        &self,
        sync: Arc<dyn OrgUnitSync>,
        cron_expression: &str,
    ) -> Result<(), ScheduleError> {
        let handle = spawn_daily_refresh(sync, cron_expression, self.runner.range().clock())?;
        if let Some(previous) = self.refresh.lock().await.replace(handle) {
            previous.cancel();
        }
        Ok(())
    }

    pub async fn is_registered(&self, schedule_id: Uuid) -> bool {
        self.timers.lock().await.contains_key(&schedule_id)
    }

    /// Ids of registered schedules, sorted
    pub async fn registered_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.timers.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Cancel every timer
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        for (_, handle) in timers.drain() {
            handle.cancel();
        }
        telemetry::update_registered_schedules(0);

        if let Some(refresh) = self.refresh.lock().await.take() {
            refresh.cancel();
        }
        info!("All timers cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::InstantClock;
    use crate::dhis::{MockPeriodTypeCatalog, MockReportingDispatch};
    use crate::indicator::MockIndicatorEngine;
    use crate::models::{DataElement, DataSource, Dataset, ImportSummary, Server};
    use crate::org_units::OrgUnitCache;
    use crate::period::PeriodRangeService;
    use crate::store::{MockPeriodMappingStore, MockRequisitionPeriodSource, MockScheduleStore};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schedule(period: &str) -> Schedule {
        let server_id = Uuid::new_v4();
        let dataset_id = Uuid::new_v4();
        Schedule {
            id: Uuid::new_v4(),
            period_enumerator: period.to_string(),
            time_offset_minutes: 0,
            server: Server {
                id: server_id,
                name: "national".to_string(),
                url: "https://dhis.example.org".to_string(),
                username: "admin".to_string(),
                password: "district".to_string(),
            },
            dataset: Dataset {
                id: dataset_id,
                name: "Daily stock".to_string(),
                dhis_dataset_id: "ds1".to_string(),
                period: period.to_string(),
                time_offset_minutes: 0,
                server_id,
            },
            data_element: DataElement {
                id: Uuid::new_v4(),
                name: "SOH".to_string(),
                source: DataSource::StockBased,
                indicator: "stock on hand".to_string(),
                code: "C100".to_string(),
                category_option_combo: "default".to_string(),
                dataset_id,
            },
        }
    }

    fn registry(dispatched: Arc<AtomicUsize>, stored: Vec<Schedule>) -> SchedulerRegistry {
        let mut indicators = MockIndicatorEngine::new();
        indicators
            .expect_compute()
            .returning(|_, _, _, _, _| Ok(1.0));
        let mut dispatch = MockReportingDispatch::new();
        dispatch.expect_send().returning(move |_, _, _, _| {
            dispatched.fetch_add(1, Ordering::SeqCst);
            Ok(ImportSummary {
                status: "SUCCESS".to_string(),
                import_count: Default::default(),
                description: None,
            })
        });
        let mut store = MockScheduleStore::new();
        store
            .expect_find_all()
            .returning(move || Ok(stored.clone()));

        let clock = Arc::new(InstantClock::new(
            chrono_tz::UTC.with_ymd_and_hms(2023, 1, 17, 0, 0, 0).unwrap(),
        ));
        let runner = ScheduleRunner::new(
            PeriodRangeService::new(clock),
            Arc::new(MockPeriodMappingStore::new()),
            Arc::new(MockRequisitionPeriodSource::new()),
            Arc::new(MockPeriodTypeCatalog::new()),
            Arc::new(indicators),
            Arc::new(dispatch),
            OrgUnitCache::with_codes(vec!["HC01".to_string(), "HC02".to_string()]),
        );
        SchedulerRegistry::new(Arc::new(runner), Arc::new(store))
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance_days(days: u64) {
        for _ in 0..days {
            tokio::time::advance(std::time::Duration::from_secs(24 * 3600)).await;
            settle().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_register_keeps_single_timer() {
        let dispatched = Arc::new(AtomicUsize::new(0));
        let registry = registry(dispatched.clone(), Vec::new());
        let daily = schedule("DAILY");

        assert!(registry.register(&daily).await.unwrap());
        assert!(!registry.register(&daily).await.unwrap());
        assert_eq!(registry.registered_ids().await, vec![daily.id]);
        settle().await;

        advance_days(3).await;
        // One run per day over two organisation units
        assert_eq!(dispatched.load(Ordering::SeqCst), 6);
        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deregister_stops_firing_and_is_idempotent() {
        let dispatched = Arc::new(AtomicUsize::new(0));
        let registry = registry(dispatched.clone(), Vec::new());
        let daily = schedule("DAILY");

        registry.register(&daily).await.unwrap();
        settle().await;
        advance_days(1).await;
        assert_eq!(dispatched.load(Ordering::SeqCst), 2);

        assert!(registry.deregister(daily.id).await);
        assert!(!registry.deregister(daily.id).await);
        assert!(!registry.is_registered(daily.id).await);

        advance_days(2).await;
        assert_eq!(dispatched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recreate_all_skips_invalid_periods() {
        let stored = vec![
            schedule("DAILY"),
            schedule("WEEKLY_WEDNESDAY"),
            schedule("FORTNIGHTLY"),
        ];
        let registry = registry(Arc::new(AtomicUsize::new(0)), stored.clone());

        assert_eq!(registry.recreate_all().await.unwrap(), 2);
        assert!(registry.is_registered(stored[0].id).await);
        assert!(registry.is_registered(stored[1].id).await);
        assert!(!registry.is_registered(stored[2].id).await);

        // Calling again registers nothing new
        assert_eq!(registry.recreate_all().await.unwrap(), 0);
        registry.shutdown().await;
        assert!(registry.registered_ids().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_rejects_unknown_period() {
        let registry = registry(Arc::new(AtomicUsize::new(0)), Vec::new());
        let err = registry.register(&schedule("HOURLY")).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Period(_)));
        assert!(registry.registered_ids().await.is_empty());
    }
}
