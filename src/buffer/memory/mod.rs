//! Buffer sizing from host memory telemetry

pub mod capacity;
pub mod heap_introspection;

pub use capacity::CapacityCalculator;
pub use heap_introspection::{
    HeapIntrospection, MemoryPool, ProcessHeapIntrospection, StaticHeapIntrospection,
    detect_old_gen_max, parse_memory_flag,
};
