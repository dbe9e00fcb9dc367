// Repository layer for database operations

pub mod period_mapping;
pub mod processing_period;
pub mod queries;
pub mod schedule;

pub use period_mapping::PeriodMappingRepository;
pub use processing_period::ProcessingPeriodRepository;
pub use schedule::ScheduleRepository;
