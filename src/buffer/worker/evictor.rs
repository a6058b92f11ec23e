//! Evictor role: waits for eviction pressure and removes oldest fragments

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use super::maintenance::{MaintenanceSubmitter, MaintenanceTracker};
use crate::buffer::chain::{Chain, EvictionOutcome};
use crate::buffer::traits::{BufferOperationError, IndexSink};

pub struct Evictor<T> {
    chain: Arc<Chain<T>>,
    sink: Arc<dyn IndexSink<T>>,
    tracker: Arc<MaintenanceTracker>,
    cleaner: Option<MaintenanceSubmitter>,
    retry_wait: Duration,
}

impl<T: Send + Sync + 'static> Evictor<T> {
    pub fn new(
        chain: Arc<Chain<T>>,
        sink: Arc<dyn IndexSink<T>>,
        tracker: Arc<MaintenanceTracker>,
        cleaner: Option<MaintenanceSubmitter>,
        retry_wait: Duration,
    ) -> Self {
        Self {
            chain,
            sink,
            tracker,
            cleaner,
            retry_wait,
        }
    }

    /// Evict one fragment now, releasing removed payloads from the index
    pub fn evict(&self) -> EvictionOutcome {
        let outcome = self.chain.evict(|payload| self.sink.release(payload));

        if self.tracker.record_removed(outcome.bytes) {
            if let Some(cleaner) = &self.cleaner {
                let sink = self.sink.clone();
                if cleaner.submit(move || sink.clean()) {
                    debug!("Indexing tree clean pass scheduled");
                }
            }
        }
        outcome
    }

    /// Block until eviction is due, then evict one fragment
    ///
    /// When nothing can be removed (only the newest element is left) the
    /// evictor waits for the next append instead of spinning.
    pub fn run_once(&self) -> Result<EvictionOutcome, BufferOperationError> {
        self.chain.await_eviction_pressure()?;
        let outcome = self.evict();
        if outcome.is_empty() {
            self.chain.data_signal().wait_timeout(self.retry_wait)?;
        }
        Ok(outcome)
    }
}
