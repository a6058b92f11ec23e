//! Background workers: one thread per role plus the maintenance pool

pub mod evictor;
pub mod maintenance;
pub mod shell;
pub mod types;

pub use evictor::Evictor;
pub use maintenance::{MaintenancePool, MaintenanceSubmitter, MaintenanceTracker};
pub use shell::WorkerShell;
pub use types::{Lifecycle, LifecycleState, WorkerState, WorkerStatsSnapshot};
