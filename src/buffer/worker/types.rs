//! Worker lifecycle flag and per-worker counters

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::atomic::AtomicCell;

/// Shared lifecycle of the buffer's background workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    StopRequested,
    Stopped,
}

/// Cooperative stop flag read by every worker loop
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicCell<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicCell::new(LifecycleState::Running),
        }
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Move Running to StopRequested, false if a stop was already requested
    pub fn request_stop(&self) -> bool {
        self.state
            .compare_exchange(LifecycleState::Running, LifecycleState::StopRequested)
            .is_ok()
    }

    /// Record that every worker has exited
    pub fn mark_stopped(&self) {
        self.state.store(LifecycleState::Stopped);
    }
}

/// Per-worker loop counters
#[derive(Debug, Default)]
pub struct WorkerState {
    cycles: AtomicU64,
    interruptions: AtomicU64,
    failures: AtomicU64,
}

impl WorkerState {
    #[inline]
    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_interruption(&self) {
        self.interruptions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            interruptions: self.interruptions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub cycles: u64,
    pub interruptions: u64,
    pub failures: u64,
}
