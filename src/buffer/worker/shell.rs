//! Dedicated thread driving one worker role until shutdown

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use super::types::{Lifecycle, WorkerState, WorkerStatsSnapshot};
use crate::buffer::traits::{BufferOperationError, WorkerRole};

const FAILURE_BACKOFF: Duration = Duration::from_millis(10);

/// One long-lived thread per role
///
/// Runs its operation in a loop while the lifecycle is `Running`.
/// Interruption is counted and the loop re-checks the lifecycle; any other
/// error is logged and retried after a short backoff.
pub struct WorkerShell {
    role: WorkerRole,
    state: Arc<WorkerState>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerShell {
    pub fn spawn<F>(
        role: WorkerRole,
        lifecycle: Arc<Lifecycle>,
        mut operation: F,
    ) -> Result<Self, BufferOperationError>
    where
        F: FnMut() -> Result<(), BufferOperationError> + Send + 'static,
    {
        let state = Arc::new(WorkerState::default());
        let worker_state = state.clone();

        let handle = std::thread::Builder::new()
            .name(format!("telebuf-{}", role))
            .spawn(move || {
                raise_priority(role);
                debug!("{} worker started", role);

                while lifecycle.is_running() {
                    match operation() {
                        Ok(()) => worker_state.record_cycle(),
                        Err(BufferOperationError::Interrupted) => {
                            worker_state.record_interruption();
                            debug!("{} worker interrupted", role);
                        }
                        Err(e) => {
                            worker_state.record_failure();
                            warn!("{} worker cycle failed: {}", role, e);
                            std::thread::sleep(FAILURE_BACKOFF);
                        }
                    }
                }

                debug!("{} worker exiting", role);
            })
            .map_err(|e| BufferOperationError::WorkerSpawn(format!("{}: {}", role, e)))?;

        info!("|-{} worker thread started", role);
        Ok(Self {
            role,
            state,
            handle: Some(handle),
        })
    }

    #[inline]
    pub fn role(&self) -> WorkerRole {
        self.role
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.state.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wait for the thread to exit, the lifecycle must already be stopping
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{} worker panicked", self.role);
            }
        }
    }
}

impl std::fmt::Debug for WorkerShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerShell")
            .field("role", &self.role)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(target_os = "linux")]
fn raise_priority(role: WorkerRole) {
    // best effort: needs CAP_SYS_NICE
    let tid = unsafe { libc::syscall(libc::SYS_gettid) };
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid as libc::id_t, -20) };
    if result != 0 {
        debug!(
            "{} worker keeps default priority: {}",
            role,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn raise_priority(role: WorkerRole) {
    debug!("{} worker keeps default priority", role);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::chain::WakeSignal;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_loop_runs_until_stop() {
        let lifecycle = Arc::new(Lifecycle::new());
        let runs = Arc::new(AtomicU64::new(0));
        let counter = runs.clone();

        let mut shell = WorkerShell::spawn(WorkerRole::Analyzer, lifecycle.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
            Ok(())
        })
        .unwrap();

        while runs.load(Ordering::SeqCst) < 3 {
            std::thread::yield_now();
        }
        lifecycle.request_stop();
        shell.join();

        assert!(shell.is_finished());
        assert!(shell.stats().cycles >= 3);
        assert_eq!(shell.stats().failures, 0);
    }

    #[test]
    fn test_interruption_is_not_fatal() {
        let lifecycle = Arc::new(Lifecycle::new());
        let signal = Arc::new(WakeSignal::new());
        let wait_signal = signal.clone();

        let mut shell = WorkerShell::spawn(WorkerRole::Evictor, lifecycle.clone(), move || {
            wait_signal.wait_until(|| false)
        })
        .unwrap();

        while signal.waiter_count() == 0 {
            std::thread::yield_now();
        }
        lifecycle.request_stop();
        signal.interrupt();
        shell.join();

        let stats = shell.stats();
        assert_eq!(stats.interruptions, 1);
        assert_eq!(stats.failures, 0);
    }

    #[test]
    fn test_errors_are_counted_and_retried() {
        let lifecycle = Arc::new(Lifecycle::new());
        let attempts = Arc::new(AtomicU64::new(0));
        let counter = attempts.clone();

        let mut shell = WorkerShell::spawn(WorkerRole::Indexer, lifecycle.clone(), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(BufferOperationError::invalid_state("transient"))
            } else {
                Ok(())
            }
        })
        .unwrap();

        while attempts.load(Ordering::SeqCst) < 2 {
            std::thread::yield_now();
        }
        lifecycle.request_stop();
        shell.join();
        assert_eq!(shell.stats().failures, 1);
    }
}
