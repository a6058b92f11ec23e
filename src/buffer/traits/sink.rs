//! Call contracts of the external consumers fed by the scan engines
//!
//! The indexing tree and the analysis accumulator live outside this crate;
//! only the calls the buffer makes on them are defined here.

/// Indexing tree receiving processed elements for querying
pub trait IndexSink<T>: Send + Sync {
    /// Insert one element into the index
    fn index(&self, payload: &T);

    /// Element was evicted from the buffer, drop any reference to it
    fn release(&self, payload: &T);

    /// Current retained size of the index structure in bytes
    fn component_size(&self) -> u64 {
        0
    }

    /// Remove emptied branches after a batch of evictions
    fn clean(&self) {}
}

/// Analysis accumulator fed in insertion order
pub trait AnalysisSink<T>: Send + Sync {
    /// Accumulate one element
    fn analyze(&self, payload: &T);
}

/// Index sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndexSink;

impl<T> IndexSink<T> for NoopIndexSink {
    fn index(&self, _payload: &T) {}

    fn release(&self, _payload: &T) {}
}

/// Analysis sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalysisSink;

impl<T> AnalysisSink<T> for NoopAnalysisSink {
    fn analyze(&self, _payload: &T) {}
}
