//! Linked element chain: the retention buffer itself
//!
//! Lock-free append at the newest end, fragment eviction at the oldest end,
//! per-consumer cursors and the wake-up signals consumers block on.

pub mod core;
pub mod cursor;
pub mod element;
pub mod eviction;
pub mod signal;
pub mod statistics;

pub use self::core::{Chain, ChainLimits};
pub use cursor::Cursor;
pub use element::Element;
pub use eviction::EvictionOutcome;
pub use signal::WakeSignal;
pub use statistics::{BufferStatsSnapshot, ChainCounters};
