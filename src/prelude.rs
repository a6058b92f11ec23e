//! Telebuf prelude - convenient imports for users

// Re-export the public API
pub use crate::telebuf::{Telebuf, TelebufBuilder};

// Configuration and errors
pub use crate::buffer::config::BufferConfig;
pub use crate::buffer::traits::BufferOperationError;

// Statistics
pub use crate::buffer::chain::BufferStatsSnapshot;
pub use crate::buffer::worker::{LifecycleState, WorkerStatsSnapshot};

// Collaborator traits and ready-made implementations
pub use crate::buffer::memory::{HeapIntrospection, ProcessHeapIntrospection, StaticHeapIntrospection};
pub use crate::buffer::traits::{
    AnalysisSink, FixedSizeEstimator, IndexSink, NoopAnalysisSink, NoopIndexSink, SizeEstimator,
    Sizeable, SizeableEstimator, WorkerRole,
};
