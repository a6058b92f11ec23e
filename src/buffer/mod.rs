//! Retention buffer internals
//!
//! Layered bottom-up: shared traits and errors, configuration, memory
//! sizing, the element chain, scan engines and the worker threads that
//! drive them.

pub mod chain;
pub mod config;
pub mod memory;
pub mod scan;
pub mod traits;
pub mod worker;
