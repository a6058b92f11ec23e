//! Simple public API for the telebuf retention buffer
//!
//! `Telebuf<T>` owns the chain, the three role workers (indexer, analyzer,
//! evictor) and the indexing tree maintenance pool. Producers call
//! [`Telebuf::put`]; everything else happens on background threads until
//! [`Telebuf::shutdown`] or drop.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::buffer::chain::{BufferStatsSnapshot, Chain};
use crate::buffer::config::BufferConfig;
use crate::buffer::memory::{
    CapacityCalculator, HeapIntrospection, ProcessHeapIntrospection, StaticHeapIntrospection,
};
use crate::buffer::scan::{AnalysisProcessor, IndexProcessor, ScanEngine};
use crate::buffer::traits::{
    AnalysisSink, BufferOperationError, IndexSink, NoopAnalysisSink, NoopIndexSink,
    SizeEstimator, Sizeable, SizeableEstimator, WorkerRole,
};
use crate::buffer::worker::{
    Evictor, Lifecycle, LifecycleState, MaintenancePool, MaintenanceTracker, WorkerShell,
    WorkerStatsSnapshot,
};

/// Running retention buffer with its background workers
pub struct Telebuf<T: Send + Sync + 'static> {
    chain: Arc<Chain<T>>,
    estimator: Arc<dyn SizeEstimator<T>>,
    index_sink: Arc<dyn IndexSink<T>>,
    expansion_rate: f64,
    lifecycle: Arc<Lifecycle>,
    workers: Vec<WorkerShell>,
    maintenance: MaintenancePool,
}

impl<T: Send + Sync + 'static> Telebuf<T> {
    /// Create new buffer builder with fluent configuration
    pub fn builder() -> TelebufBuilder<T> {
        TelebufBuilder::new()
    }

    /// Append one record, never blocks
    ///
    /// The stored size is the estimated size inflated by the expansion rate.
    /// Returns the record's sequence number.
    pub fn put(&self, payload: T) -> u64 {
        let estimated = self.estimator.estimate_size(&payload);
        let size_bytes = (estimated as f64 * (1.0 + self.expansion_rate)) as u64;
        self.chain.append(payload, size_bytes).sequence()
    }

    /// Buffer capacity in bytes, fixed at startup
    pub fn capacity_bytes(&self) -> u64 {
        self.chain.capacity_bytes()
    }

    /// Bytes currently accounted to buffered records
    pub fn occupied_bytes(&self) -> u64 {
        self.chain.occupied_bytes()
    }

    /// Object size expansion rate applied to every estimate
    pub fn expansion_rate(&self) -> f64 {
        self.expansion_rate
    }

    pub fn stats(&self) -> BufferStatsSnapshot {
        self.chain.stats()
    }

    /// Loop counters of every worker thread
    pub fn worker_stats(&self) -> Vec<(WorkerRole, WorkerStatsSnapshot)> {
        self.workers
            .iter()
            .map(|worker| (worker.role(), worker.stats()))
            .collect()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Drop every buffered record, releasing each from the index
    ///
    /// Producers are not blocked; records put concurrently may survive.
    /// Returns the number of records removed.
    pub fn clear(&self) -> u64 {
        let outcome = self.chain.clear(|payload| self.index_sink.release(payload));
        self.index_sink.clean();
        info!("Buffer cleared: {} records, {} bytes", outcome.elements, outcome.bytes);
        outcome.elements
    }

    /// Shared chain, for embedders driving their own consumers
    pub fn chain(&self) -> &Arc<Chain<T>> {
        &self.chain
    }

    /// Request stop, interrupt blocked workers and join every thread
    pub fn shutdown(&mut self) {
        if self.lifecycle.state() == LifecycleState::Stopped {
            return;
        }
        self.lifecycle.request_stop();
        self.chain.interrupt();

        for worker in &mut self.workers {
            worker.join();
        }
        // evictor's submitter is gone with its thread
        self.maintenance.shutdown();

        self.lifecycle.mark_stopped();
        info!("Buffer stopped. {}", self.chain.stats());
    }
}

impl<T: Clone + Send + Sync + 'static> Telebuf<T> {
    pub fn oldest_payload(&self) -> Option<T> {
        self.chain.oldest_payload()
    }

    pub fn newest_payload(&self) -> Option<T> {
        self.chain.newest_payload()
    }
}

impl<T: Send + Sync + 'static> Drop for Telebuf<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Telebuf<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telebuf")
            .field("chain", &self.chain)
            .field("expansion_rate", &self.expansion_rate)
            .field("lifecycle", &self.lifecycle.state())
            .field("workers", &self.workers)
            .finish()
    }
}

/// Fluent builder for [`Telebuf`]
pub struct TelebufBuilder<T: Send + Sync + 'static> {
    config: BufferConfig,
    introspection: Option<Box<dyn HeapIntrospection>>,
    estimator: Option<Arc<dyn SizeEstimator<T>>>,
    index_sink: Option<Arc<dyn IndexSink<T>>>,
    analysis_sink: Option<Arc<dyn AnalysisSink<T>>>,
    index_after_analysis: bool,
}

impl<T: Send + Sync + 'static> TelebufBuilder<T> {
    /// Create new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: BufferConfig::default(),
            introspection: None,
            estimator: None,
            index_sink: None,
            analysis_sink: None,
            index_after_analysis: true,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: BufferConfig) -> Self {
        self.config = config;
        self
    }

    /// Set occupancy fraction above which eviction runs
    pub fn eviction_occupancy_percentage(mut self, fraction: f64) -> Self {
        self.config.eviction_occupancy_percentage = fraction;
        self
    }

    /// Set fraction of capacity removed per eviction pass
    pub fn eviction_fragment_size_percentage(mut self, fraction: f64) -> Self {
        self.config.eviction_fragment_size_percentage = fraction;
        self
    }

    /// Set how long the indexer waits for analysis before retrying
    pub fn indexing_wait_time(mut self, wait: Duration) -> Self {
        self.config.indexing_wait_time = wait.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    /// Set number of indexing tree cleaning threads
    pub fn indexing_tree_cleaning_threads(mut self, threads: usize) -> Self {
        self.config.indexing_tree_cleaning_threads = threads;
        self
    }

    /// Use custom host memory telemetry
    pub fn heap_introspection<H: HeapIntrospection + 'static>(mut self, introspection: H) -> Self {
        self.introspection = Some(Box::new(introspection));
        self
    }

    /// Size the buffer against a known old generation ceiling
    pub fn old_gen_max(self, bytes: u64) -> Self {
        self.heap_introspection(StaticHeapIntrospection::old_gen(bytes))
    }

    pub fn size_estimator<E: SizeEstimator<T> + 'static>(mut self, estimator: E) -> Self {
        self.estimator = Some(Arc::new(estimator));
        self
    }

    pub fn index_sink(mut self, sink: Arc<dyn IndexSink<T>>) -> Self {
        self.index_sink = Some(sink);
        self
    }

    pub fn analysis_sink(mut self, sink: Arc<dyn AnalysisSink<T>>) -> Self {
        self.analysis_sink = Some(sink);
        self
    }

    /// Hold back indexing until the analyzer has processed an element (default on)
    pub fn index_after_analysis(mut self, enabled: bool) -> Self {
        self.index_after_analysis = enabled;
        self
    }

    /// Validate, size and start the buffer
    ///
    /// Configuration and heap introspection failures abort before any
    /// thread is started.
    pub fn build(self) -> Result<Telebuf<T>, BufferOperationError> {
        let config = self.config;
        config.validate()?;
        config.log_properties();

        let estimator = self.estimator.ok_or_else(|| {
            BufferOperationError::invalid_state("no size estimator configured for the buffer")
        })?;
        let introspection = self
            .introspection
            .unwrap_or_else(|| Box::new(ProcessHeapIntrospection) as Box<dyn HeapIntrospection>);

        let calculator = CapacityCalculator::detect(&config, introspection.as_ref())?;
        let capacity = calculator.initial_buffer_size();
        let expansion_rate = calculator.object_security_expansion_rate(capacity);
        calculator.log_sizing(capacity);

        let chain = Arc::new(Chain::new(calculator.chain_limits(capacity)));
        let tracker = Arc::new(MaintenanceTracker::new(
            calculator.maintenance_threshold_bytes(capacity),
        ));
        let maintenance = MaintenancePool::new(config.indexing_tree_cleaning_threads)?;

        let index_sink = self
            .index_sink
            .unwrap_or_else(|| Arc::new(NoopIndexSink) as Arc<dyn IndexSink<T>>);
        let analysis_sink = self
            .analysis_sink
            .unwrap_or_else(|| Arc::new(NoopAnalysisSink) as Arc<dyn AnalysisSink<T>>);
        let retry_wait = Duration::from_millis(config.indexing_wait_time);

        let mut analyzer = ScanEngine::new(
            chain.clone(),
            WorkerRole::Analyzer,
            AnalysisProcessor::new(analysis_sink),
            retry_wait,
        );
        let mut index_step = IndexProcessor::new(chain.clone(), index_sink.clone(), tracker.clone());
        if self.index_after_analysis {
            index_step = index_step.after(analyzer.cursor().clone());
        }
        let mut indexer = ScanEngine::new(chain.clone(), WorkerRole::Indexer, index_step, retry_wait);
        let evictor = Evictor::new(
            chain.clone(),
            index_sink.clone(),
            tracker,
            maintenance.submitter(),
            retry_wait,
        );

        let lifecycle = Arc::new(Lifecycle::new());
        let mut buffer = Telebuf {
            chain,
            estimator,
            index_sink,
            expansion_rate,
            lifecycle: lifecycle.clone(),
            workers: Vec::with_capacity(3),
            maintenance,
        };

        // The evictor goes first: its closure owns the only maintenance
        // submitter, so every later failure leaves nothing outside `buffer`
        // holding pool resources. Dropping `buffer` stops what was started.
        buffer.workers.push(WorkerShell::spawn(
            WorkerRole::Evictor,
            lifecycle.clone(),
            move || evictor.run_once().map(|_| ()),
        )?);
        buffer.workers.push(WorkerShell::spawn(
            WorkerRole::Analyzer,
            lifecycle.clone(),
            move || analyzer.cycle().map(|_| ()),
        )?);
        buffer.workers.push(WorkerShell::spawn(
            WorkerRole::Indexer,
            lifecycle,
            move || indexer.cycle().map(|_| ()),
        )?);

        info!(
            "|-Buffer started: capacity {} bytes, expansion rate {:.2}%",
            buffer.capacity_bytes(),
            buffer.expansion_rate * 100.0
        );
        if capacity == 0 {
            warn!("Buffer capacity is zero, every record will be evicted as soon as possible");
        }
        Ok(buffer)
    }
}

impl<T: Sizeable + Send + Sync + 'static> TelebufBuilder<T> {
    /// Estimate sizes through the payload's own [`Sizeable`] impl
    pub fn sizeable(self) -> Self {
        self.size_estimator(SizeableEstimator::<T>::new())
    }
}

impl<T: Send + Sync + 'static> Default for TelebufBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
