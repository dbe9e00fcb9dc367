// Daily organisation-unit refresh

use crate::clock::Clock;
use crate::errors::ScheduleError;
use crate::org_units::OrgUnitSync;
use crate::schedule::CronTrigger;
use crate::scheduler::timer::{spawn_timer, TimerHandle, TimerJob};
use std::sync::Arc;
use tracing::{info, warn};

/// Refresh the cache once. Failures keep the previous snapshot and are only logged.
pub async fn refresh_once(sync: &dyn OrgUnitSync) -> Option<usize> {
    match sync.refresh().await {
        Ok(size) => {
            info!(org_units = size, "Organisation unit refresh succeeded");
            Some(size)
        }
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "Organisation unit refresh failed, keeping previous list");
            None
        }
    }
}

fn refresh_job(sync: Arc<dyn OrgUnitSync>) -> TimerJob {
    Arc::new(move || {
        let sync = sync.clone();
        Box::pin(async move {
            refresh_once(sync.as_ref()).await;
        })
    })
}

/// Start the refresh timer on `cron_expression`
pub fn spawn_daily_refresh(
    sync: Arc<dyn OrgUnitSync>,
    cron_expression: &str,
    clock: Arc<dyn Clock>,
) -> Result<TimerHandle, ScheduleError> {
    let trigger = CronTrigger::new(cron_expression, clock.clone())?;
    Ok(spawn_timer(
        "org-unit-refresh",
        Arc::new(trigger),
        clock,
        refresh_job(sync),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::InstantClock;
    use crate::errors::IntegrationError;
    use crate::org_units::MockOrgUnitSync;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_refresh_once_swallows_failure() {
        let mut sync = MockOrgUnitSync::new();
        sync.expect_refresh()
            .times(1)
            .returning(|| Err(IntegrationError::ConnectionFailed("refused".to_string())));
        assert_eq!(refresh_once(&sync).await, None);
    }

    #[tokio::test]
    async fn test_refresh_once_reports_size() {
        let mut sync = MockOrgUnitSync::new();
        sync.expect_refresh().times(1).returning(|| Ok(12));
        assert_eq!(refresh_once(&sync).await, Some(12));
    }

    #[test]
    fn test_invalid_cron_is_rejected() {
        let clock = Arc::new(InstantClock::new(
            chrono_tz::UTC.with_ymd_and_hms(2023, 1, 17, 0, 0, 0).unwrap(),
        ));
        let result = spawn_daily_refresh(Arc::new(MockOrgUnitSync::new()), "every day", clock);
        assert!(matches!(
            result,
            Err(ScheduleError::InvalidCronExpression { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_fires_daily_and_survives_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let mut sync = MockOrgUnitSync::new();
        sync.expect_refresh().returning(move || {
            // Every other refresh fails
            if counted.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Err(IntegrationError::ConnectionFailed("refused".to_string()))
            } else {
                Ok(3)
            }
        });

        let clock = Arc::new(InstantClock::new(
            chrono_tz::UTC.with_ymd_and_hms(2023, 1, 17, 3, 0, 0).unwrap(),
        ));
        let handle = spawn_daily_refresh(Arc::new(sync), "0 0 2 * * *", clock).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // 23h to the first 02:00, then three more days
        for hours in [23, 24, 24, 24] {
            tokio::time::advance(std::time::Duration::from_secs(hours * 3600)).await;
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(!handle.is_finished());
        handle.cancel();
    }
}
