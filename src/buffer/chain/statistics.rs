//! Chain counters and point-in-time occupancy snapshots

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use super::core::Chain;
use crate::buffer::traits::WorkerRole;

/// Cumulative append and eviction counters
#[derive(Debug, Default)]
pub struct ChainCounters {
    elements_added: CachePadded<AtomicU64>,
    bytes_added: CachePadded<AtomicU64>,
    elements_evicted: AtomicU64,
    bytes_removed: AtomicU64,
    eviction_passes: AtomicU64,
}

impl ChainCounters {
    #[inline(always)]
    pub fn record_added(&self, bytes: u64) {
        self.elements_added.fetch_add(1, Ordering::Relaxed);
        self.bytes_added.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evicted(&self, elements: u64, bytes: u64) {
        self.elements_evicted.fetch_add(elements, Ordering::Relaxed);
        self.bytes_removed.fetch_add(bytes, Ordering::Relaxed);
        self.eviction_passes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of buffer occupancy and consumer progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferStatsSnapshot {
    pub capacity_bytes: u64,
    pub occupied_bytes: u64,
    pub indexing_tree_bytes: u64,
    pub elements_added: u64,
    pub elements_indexed: u64,
    pub elements_analyzed: u64,
    pub elements_evicted: u64,
    pub bytes_added: u64,
    pub bytes_removed: u64,
    pub eviction_passes: u64,
}

impl BufferStatsSnapshot {
    /// Occupied bytes as a percentage of capacity
    pub fn occupancy_percentage(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.occupied_bytes as f64 / self.capacity_bytes as f64 * 100.0
        }
    }

    /// Elements currently buffered
    #[inline]
    pub fn elements_buffered(&self) -> u64 {
        self.elements_added.saturating_sub(self.elements_evicted)
    }
}

impl fmt::Display for BufferStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The buffer occupancy status: {} bytes occupied from total {} bytes available ({:.2}%). \
             Indexing tree size: {} bytes. Elements processed in the buffer: {} added, {} indexed, \
             {} analyzed, {} evicted in {} passes.",
            self.occupied_bytes,
            self.capacity_bytes,
            self.occupancy_percentage(),
            self.indexing_tree_bytes,
            self.elements_added,
            self.elements_indexed,
            self.elements_analyzed,
            self.elements_evicted,
            self.eviction_passes
        )
    }
}

impl<T> Chain<T> {
    /// Snapshot of counters, consumer progress comes from registered cursors
    pub fn stats(&self) -> BufferStatsSnapshot {
        let processed = |role| self.cursor(role).map_or(0, |c| c.processed_count());
        BufferStatsSnapshot {
            capacity_bytes: self.capacity_bytes(),
            occupied_bytes: self.occupied_bytes(),
            indexing_tree_bytes: self.indexing_tree_bytes(),
            elements_added: self.counters.elements_added.load(Ordering::Relaxed),
            elements_indexed: processed(WorkerRole::Indexer),
            elements_analyzed: processed(WorkerRole::Analyzer),
            elements_evicted: self.counters.elements_evicted.load(Ordering::Relaxed),
            bytes_added: self.counters.bytes_added.load(Ordering::Relaxed),
            bytes_removed: self.counters.bytes_removed.load(Ordering::Relaxed),
            eviction_passes: self.counters.eviction_passes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::chain::core::ChainLimits;

    #[test]
    fn test_stats_track_appends_and_evictions() {
        let chain: Chain<u32> = Chain::new(ChainLimits::from_fractions(10_240, 0.8, 0.1));
        let indexer = chain.register_cursor(WorkerRole::Indexer);
        for i in 0..9 {
            chain.append(i, 1_024);
        }
        let first = chain.candidate(&indexer).unwrap();
        indexer.advance(&first);
        chain.evict(|_| {});

        let stats = chain.stats();
        assert_eq!(stats.elements_added, 9);
        assert_eq!(stats.bytes_added, 9 * 1_024);
        assert_eq!(stats.elements_evicted, 1);
        assert_eq!(stats.bytes_removed, 1_024);
        assert_eq!(stats.eviction_passes, 1);
        assert_eq!(stats.elements_indexed, 1);
        assert_eq!(stats.elements_analyzed, 0);
        assert_eq!(stats.elements_buffered(), 8);
        assert!((stats.occupancy_percentage() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_display() {
        let stats = BufferStatsSnapshot {
            capacity_bytes: 1_000,
            occupied_bytes: 250,
            indexing_tree_bytes: 0,
            elements_added: 5,
            elements_indexed: 4,
            elements_analyzed: 3,
            elements_evicted: 0,
            bytes_added: 250,
            bytes_removed: 0,
            eviction_passes: 0,
        };
        let text = stats.to_string();
        assert!(text.starts_with("The buffer occupancy status: 250 bytes occupied"));
        assert!(text.contains("(25.00%)"));
        assert!(text.contains("5 added, 4 indexed, 3 analyzed"));
    }

    #[test]
    fn test_zero_capacity_percentage() {
        let chain: Chain<u32> = Chain::new(ChainLimits::from_fractions(0, 0.8, 0.1));
        assert_eq!(chain.stats().occupancy_percentage(), 0.0);
    }
}
