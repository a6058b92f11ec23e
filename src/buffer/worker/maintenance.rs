//! Batched indexing tree maintenance
//!
//! Updating the tree size and cleaning emptied branches are too expensive to
//! run per element. The tracker accumulates bytes indexed and bytes evicted
//! and reports when either crosses the maintenance threshold; clean passes
//! run on a small dedicated pool fed over a bounded channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError, select};
use log::{debug, info, warn};

use crate::buffer::traits::BufferOperationError;

/// Byte accumulators for the two maintenance triggers
#[derive(Debug)]
pub struct MaintenanceTracker {
    threshold_bytes: u64,
    added_since_update: AtomicU64,
    removed_since_clean: AtomicU64,
}

impl MaintenanceTracker {
    pub fn new(threshold_bytes: u64) -> Self {
        Self {
            threshold_bytes,
            added_since_update: AtomicU64::new(0),
            removed_since_clean: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    /// Count indexed bytes, true when a tree size update is due
    pub fn record_added(&self, bytes: u64) -> bool {
        accumulate(&self.added_since_update, bytes, self.threshold_bytes)
    }

    /// Count evicted bytes, true when a clean pass is due
    pub fn record_removed(&self, bytes: u64) -> bool {
        accumulate(&self.removed_since_clean, bytes, self.threshold_bytes)
    }
}

/// Add `bytes` and reset to zero once the total reaches `threshold`
fn accumulate(counter: &AtomicU64, bytes: u64, threshold: u64) -> bool {
    let mut current = counter.load(Ordering::Acquire);
    loop {
        let total = current.saturating_add(bytes);
        let crossed = total >= threshold;
        let next = if crossed { 0 } else { total };
        match counter.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return crossed,
            Err(actual) => current = actual,
        }
    }
}

type MaintenanceJob = Box<dyn FnOnce() + Send + 'static>;

/// Cheap handle for submitting clean passes
#[derive(Clone)]
pub struct MaintenanceSubmitter {
    sender: Sender<MaintenanceJob>,
}

impl MaintenanceSubmitter {
    /// Queue a job, false if the queue is full or the pool is gone
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.sender.try_send(Box::new(job)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Maintenance queue full, pass skipped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl std::fmt::Debug for MaintenanceSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceSubmitter")
            .field("queued", &self.sender.len())
            .finish()
    }
}

/// Fixed pool of indexing tree cleaning threads
pub struct MaintenancePool {
    sender: Option<Sender<MaintenanceJob>>,
    stop: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
    completed: Arc<AtomicU64>,
}

impl MaintenancePool {
    pub fn new(threads: usize) -> Result<Self, BufferOperationError> {
        let (sender, receiver) = crossbeam_channel::bounded::<MaintenanceJob>(threads.max(1) * 4);
        let (stop, stopped) = crossbeam_channel::bounded::<()>(0);
        let completed = Arc::new(AtomicU64::new(0));

        let mut pool = Self {
            sender: Some(sender),
            stop: Some(stop),
            workers: Vec::with_capacity(threads),
            completed: completed.clone(),
        };
        for worker_id in 0..threads {
            let jobs = receiver.clone();
            let stopped = stopped.clone();
            let completed = completed.clone();
            // on error `pool` drops here and stops the threads already started
            let handle = std::thread::Builder::new()
                .name(format!("telebuf-maintenance-{}", worker_id))
                .spawn(move || run_maintenance(&jobs, &stopped, &completed))
                .map_err(|e| {
                    BufferOperationError::WorkerSpawn(format!("maintenance-{}: {}", worker_id, e))
                })?;
            pool.workers.push(handle);
        }

        info!("|-Indexing tree maintenance pool started with {} threads", threads);
        Ok(pool)
    }

    /// Handle for producers of maintenance jobs, `None` after shutdown
    pub fn submitter(&self) -> Option<MaintenanceSubmitter> {
        self.sender.as_ref().map(|sender| MaintenanceSubmitter {
            sender: sender.clone(),
        })
    }

    /// Jobs finished so far
    pub fn completed_jobs(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Stop accepting jobs, run what is queued and join the threads
    ///
    /// Submitters still alive afterwards see their jobs refused.
    pub fn shutdown(&mut self) {
        self.sender.take();
        // disconnecting the stop channel wakes every idle worker
        self.stop.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Maintenance thread panicked");
            }
        }
    }
}

/// Worker loop: run jobs until stopped, then finish the queued ones
fn run_maintenance(
    jobs: &Receiver<MaintenanceJob>,
    stopped: &Receiver<()>,
    completed: &AtomicU64,
) {
    let run = |job: MaintenanceJob| {
        job();
        completed.fetch_add(1, Ordering::Relaxed);
    };
    loop {
        select! {
            recv(jobs) -> job => match job {
                Ok(job) => run(job),
                Err(_) => break,
            },
            recv(stopped) -> _ => {
                for job in jobs.try_iter() {
                    run(job);
                }
                break;
            }
        }
    }
    debug!("Maintenance thread exiting");
}

impl Drop for MaintenancePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MaintenancePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenancePool")
            .field("threads", &self.workers.len())
            .field("completed", &self.completed_jobs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_resets_after_crossing() {
        let tracker = MaintenanceTracker::new(100);
        assert!(!tracker.record_added(60));
        assert!(tracker.record_added(40));
        assert!(!tracker.record_added(99));
        assert!(tracker.record_added(1));

        // independent counters
        assert!(!tracker.record_removed(50));
        assert!(tracker.record_removed(500));
    }

    #[test]
    fn test_pool_runs_jobs() {
        let mut pool = MaintenancePool::new(2).unwrap();
        let hits = Arc::new(AtomicU64::new(0));

        {
            let submitter = pool.submitter().unwrap();
            for _ in 0..4 {
                let hits = hits.clone();
                assert!(submitter.submit(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }

        pool.shutdown();
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(pool.completed_jobs(), 4);
        assert!(pool.submitter().is_none());
    }

    #[test]
    fn test_shutdown_with_live_submitter() {
        let mut pool = MaintenancePool::new(2).unwrap();
        let submitter = pool.submitter().unwrap();
        let hits = Arc::new(AtomicU64::new(0));
        {
            let hits = hits.clone();
            assert!(submitter.submit(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let (done, finished) = crossbeam_channel::bounded(1);
        let joiner = std::thread::spawn(move || {
            pool.shutdown();
            let _ = done.send(pool.completed_jobs());
        });
        let completed = finished
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("pool shutdown returned");
        joiner.join().unwrap();

        assert_eq!(completed, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // every worker is gone, the queue no longer accepts jobs
        assert!(!submitter.submit(|| {}));
    }
}
