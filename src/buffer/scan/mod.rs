//! Scan engines draining the chain for indexing and analysis

pub mod engine;
pub mod processors;

pub use engine::{ElementProcessor, ScanEngine};
pub use processors::{AnalysisProcessor, IndexProcessor};
