// Timer facility: one tokio task per trigger binding

use crate::clock::Clock;
use crate::errors::ScheduleError;
use crate::schedule::{ScheduleTrigger, TriggerContext};
use chrono::DateTime;
use chrono_tz::Tz;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

/// Work started on every firing
pub type TimerJob = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle to a live timer task
#[derive(Debug)]
pub struct TimerHandle {
    name: String,
    handle: JoinHandle<()>,
}

impl TimerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop future firings. A run already in flight completes on its own.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// True once the timer stopped, either cancelled or after a trigger error
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Sleep until the clock reports `target`, re-sleeping if woken early
async fn sleep_until(clock: &dyn Clock, target: DateTime<Tz>) {
    loop {
        match (target - clock.now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => tokio::time::sleep(remaining).await,
            _ => return,
        }
    }
}

/// Next fire time, which must lie strictly after `now`
fn next_fire_time(
    name: &str,
    trigger: &dyn ScheduleTrigger,
    context: &TriggerContext,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>, ScheduleError> {
    let next = trigger.next_execution_time(context)?;
    if next <= now {
        return Err(ScheduleError::NonAdvancingTrigger {
            name: name.to_string(),
            next: next.to_rfc3339(),
            now: now.to_rfc3339(),
        });
    }
    Ok(next)
}

/// Spawn a timer that asks `trigger` for the next instant, sleeps until it,
/// runs `job` to completion and repeats.
///
/// Trigger queries and runs of one timer never overlap. A trigger error stops
/// this timer only.
pub fn spawn_timer(
    name: impl Into<String>,
    trigger: Arc<dyn ScheduleTrigger>,
    clock: Arc<dyn Clock>,
    job: TimerJob,
) -> TimerHandle {
    let name = name.into();
    let span = tracing::info_span!("timer", name = %name, trigger = %trigger.describe());
    let task_name = name.clone();

    let handle = tokio::spawn(
        async move {
            let mut context = TriggerContext::default();
            loop {
                let now = clock.now();
                let next = match next_fire_time(&task_name, trigger.as_ref(), &context, now) {
                    Ok(next) => next,
                    Err(e) => {
                        error!(error = %e, "Timer stopped");
                        return;
                    }
                };
                debug!(next = %next, "Timer armed");

                sleep_until(clock.as_ref(), next).await;
                context.last_scheduled = Some(next);

                // The run lives on its own task so cancelling the timer leaves it alone
                if let Err(e) = tokio::spawn(job()).await {
                    error!(error = %e, "Timer job panicked");
                }
                context.last_completed = Some(clock.now());
            }
        }
        .instrument(span),
    );

    info!(name = %name, "Timer started");
    TimerHandle { name, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::InstantClock;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn origin() -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(2023, 1, 17, 0, 0, 0).unwrap()
    }

    /// Fires every `step` after the clock's current instant
    struct StepTrigger {
        clock: Arc<dyn Clock>,
        step: Duration,
    }

    impl ScheduleTrigger for StepTrigger {
        fn next_execution_time(
            &self,
            _context: &TriggerContext,
        ) -> Result<DateTime<Tz>, ScheduleError> {
            Ok(self.clock.now() + self.step)
        }

        fn describe(&self) -> String {
            format!("every {}", self.step)
        }
    }

    /// Always answers the same instant
    struct FrozenTrigger(DateTime<Tz>);

    impl ScheduleTrigger for FrozenTrigger {
        fn next_execution_time(
            &self,
            _context: &TriggerContext,
        ) -> Result<DateTime<Tz>, ScheduleError> {
            Ok(self.0)
        }

        fn describe(&self) -> String {
            "frozen".to_string()
        }
    }

    fn counting_job(counter: Arc<AtomicUsize>) -> TimerJob {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    /// Let woken timers and the runs they spawn make progress
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(duration: std::time::Duration) {
        tokio::time::advance(duration).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_on_each_step() {
        let clock: Arc<dyn Clock> = Arc::new(InstantClock::new(origin()));
        let trigger = Arc::new(StepTrigger {
            clock: clock.clone(),
            step: Duration::hours(1),
        });
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = spawn_timer("hourly", trigger, clock, counting_job(counter.clone()));
        settle().await;

        for _ in 0..3 {
            advance(std::time::Duration::from_secs(3600)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.cancel();
        advance(std::time::Duration::from_secs(3 * 3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_advancing_trigger_stops_timer() {
        let clock: Arc<dyn Clock> = Arc::new(InstantClock::new(origin()));
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = spawn_timer(
            "stuck",
            Arc::new(FrozenTrigger(origin())),
            clock,
            counting_job(counter.clone()),
        );

        settle().await;
        assert!(handle.is_finished());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_does_not_abort_run_in_flight() {
        let clock: Arc<dyn Clock> = Arc::new(InstantClock::new(origin()));
        let trigger = Arc::new(StepTrigger {
            clock: clock.clone(),
            step: Duration::minutes(1),
        });
        let finished = Arc::new(Mutex::new(false));
        let job_finished = finished.clone();
        let job: TimerJob = Arc::new(move || {
            let finished = job_finished.clone();
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_secs(600)).await;
                *finished.lock().unwrap() = true;
            })
        });
        let handle = spawn_timer("slow", trigger, clock, job);
        settle().await;

        // Fire, then cancel while the run sleeps
        advance(std::time::Duration::from_secs(60)).await;
        handle.cancel();
        advance(std::time::Duration::from_secs(600)).await;

        assert!(*finished.lock().unwrap());
    }

    #[test]
    fn test_next_fire_time_rejects_past_instant() {
        let err = next_fire_time(
            "stuck",
            &FrozenTrigger(origin()),
            &TriggerContext::default(),
            origin() + Duration::seconds(1),
        )
        .unwrap_err();
        assert!(matches!(err, ScheduleError::NonAdvancingTrigger { .. }));
    }
}
