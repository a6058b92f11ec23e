//! Indexing and analysis steps plugged into [`ScanEngine`](super::ScanEngine)

use std::sync::Arc;

use log::debug;

use super::engine::ElementProcessor;
use crate::buffer::chain::{Chain, Cursor, Element};
use crate::buffer::traits::{AnalysisSink, IndexSink, ProcessOutcome};
use crate::buffer::worker::MaintenanceTracker;

/// Feeds elements to the indexing tree
///
/// With a prerequisite cursor, an element is only indexed once that cursor
/// has processed it, so the tree never exposes unanalyzed elements.
pub struct IndexProcessor<T> {
    chain: Arc<Chain<T>>,
    sink: Arc<dyn IndexSink<T>>,
    tracker: Arc<MaintenanceTracker>,
    prerequisite: Option<Arc<Cursor<T>>>,
}

impl<T> IndexProcessor<T> {
    pub fn new(
        chain: Arc<Chain<T>>,
        sink: Arc<dyn IndexSink<T>>,
        tracker: Arc<MaintenanceTracker>,
    ) -> Self {
        Self {
            chain,
            sink,
            tracker,
            prerequisite: None,
        }
    }

    /// Only index elements `cursor` has already processed
    pub fn after(mut self, cursor: Arc<Cursor<T>>) -> Self {
        self.prerequisite = Some(cursor);
        self
    }
}

impl<T: Send + Sync> ElementProcessor<T> for IndexProcessor<T> {
    fn process(&mut self, candidate: &Arc<Element<T>>, _cursor: &Cursor<T>) -> ProcessOutcome {
        if let Some(prerequisite) = &self.prerequisite {
            if prerequisite.position() < candidate.sequence() {
                return ProcessOutcome::NotYet;
            }
        }

        self.sink.index(candidate.payload());

        if self.tracker.record_added(candidate.size_bytes()) {
            let tree_bytes = self.sink.component_size();
            self.chain.set_indexing_tree_bytes(tree_bytes);
            debug!("Indexing tree size updated to {} bytes", tree_bytes);
        }
        ProcessOutcome::Handled
    }
}

/// Feeds elements to the analysis accumulator
pub struct AnalysisProcessor<T> {
    sink: Arc<dyn AnalysisSink<T>>,
}

impl<T> AnalysisProcessor<T> {
    pub fn new(sink: Arc<dyn AnalysisSink<T>>) -> Self {
        Self { sink }
    }
}

impl<T: Send + Sync> ElementProcessor<T> for AnalysisProcessor<T> {
    #[inline]
    fn process(&mut self, candidate: &Arc<Element<T>>, _cursor: &Cursor<T>) -> ProcessOutcome {
        self.sink.analyze(candidate.payload());
        ProcessOutcome::Handled
    }
}
