// Common library for the period scheduler: period arithmetic, triggers,
// timers, schedule runs and their collaborators

pub mod clock;
pub mod config;
pub mod db;
pub mod dhis;
pub mod errors;
pub mod indicator;
pub mod models;
pub mod org_units;
pub mod period;
pub mod runner;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod telemetry;
