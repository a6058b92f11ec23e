//! Buffer traits and shared types
//!
//! Collaborator contracts (size estimation, index and analysis sinks) and the
//! error taxonomy used across the buffer.

pub mod sink;
pub mod supporting_types;
pub mod types_and_enums;

pub use sink::{AnalysisSink, IndexSink, NoopAnalysisSink, NoopIndexSink};
pub use supporting_types::{FixedSizeEstimator, SizeEstimator, Sizeable, SizeableEstimator};
pub use types_and_enums::{BufferOperationError, DrainOutcome, ProcessOutcome, WorkerRole};
