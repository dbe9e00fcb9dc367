// Scheduling runtime: timers, the schedule registry and the daily refresh

pub mod refresh;
pub mod registry;
pub mod timer;

pub use refresh::{refresh_once, spawn_daily_refresh};
pub use registry::SchedulerRegistry;
pub use timer::{spawn_timer, TimerHandle, TimerJob};
