//! Telebuf - in-memory retention buffer for telemetry collectors
//!
//! Accepts a continuous stream of records from many producers, hands them in
//! insertion order to an indexer and an analyzer running on their own
//! threads, and evicts the oldest records once a memory budget derived from
//! the host's old generation is exceeded.
//!
//! # Features
//!
//! - **Lock-free append**: producers publish by compare-and-swap and never block
//! - **Independent consumers**: one cursor per role, one thread per role
//! - **Fragment eviction**: the oldest run of records is dropped in one short exclusive pass
//! - **Adaptive sizing**: capacity and object size expansion follow host memory telemetry

// Public API modules
pub mod prelude;
pub mod telebuf;

// Buffer implementation modules - traits are public for user implementations
pub mod buffer;

// Re-export the public API at the crate root for convenience
pub use prelude::*;
pub use telebuf::{Telebuf, TelebufBuilder};

// Public traits that users implement for their payloads and consumers
pub mod traits {
    pub use crate::buffer::memory::HeapIntrospection;
    pub use crate::buffer::traits::{AnalysisSink, IndexSink, SizeEstimator, Sizeable};
}
