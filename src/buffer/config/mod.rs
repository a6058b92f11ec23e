//! Buffer configuration with production-ready defaults
//!
//! Properties are loaded from JSON (or built in code), validated eagerly and
//! logged once at startup.

pub mod types;
mod validation;

pub use types::BufferConfig;
