//! The buffer chain: lock-free append, shared scan reads and wake-ups
//!
//! Elements are linked from the oldest (`tail`) toward the newest (`head`).
//! Producers publish by compare-and-swap on `head` and never block. Scans
//! hold the shared side of the clear lock for one step; eviction takes the
//! exclusive side (see `eviction.rs`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arc_swap::ArcSwapOption;
use crossbeam_utils::CachePadded;
use log::debug;

use super::cursor::Cursor;
use super::element::Element;
use super::signal::WakeSignal;
use super::statistics::ChainCounters;
use crate::buffer::traits::{BufferOperationError, WorkerRole};

/// Fixed sizing of one chain, derived once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLimits {
    /// Total byte budget
    pub capacity_bytes: u64,
    /// Occupancy above which eviction is due
    pub eviction_threshold_bytes: u64,
    /// Bytes removed by one eviction pass
    pub fragment_size_bytes: u64,
}

impl ChainLimits {
    /// Derive limits from fractions of the capacity
    pub fn from_fractions(
        capacity_bytes: u64,
        eviction_occupancy_percentage: f64,
        eviction_fragment_size_percentage: f64,
    ) -> Self {
        Self {
            capacity_bytes,
            eviction_threshold_bytes: (capacity_bytes as f64 * eviction_occupancy_percentage)
                as u64,
            fragment_size_bytes: (capacity_bytes as f64 * eviction_fragment_size_percentage)
                as u64,
        }
    }
}

/// Singly linked retention buffer shared by producers and consumers
pub struct Chain<T> {
    pub(super) head: ArcSwapOption<Element<T>>,
    pub(super) tail: ArcSwapOption<Element<T>>,
    pub(super) occupied_bytes: CachePadded<AtomicU64>,
    pub(super) indexing_tree_bytes: AtomicU64,
    pub(super) limits: ChainLimits,
    pub(super) clear_lock: RwLock<()>,
    pub(super) cursors: RwLock<Vec<Arc<Cursor<T>>>>,
    pub(super) counters: ChainCounters,
    /// Highest sequence ever removed by a clear, numbering restarts above it
    pub(super) sequence_floor: AtomicU64,
    data_signal: WakeSignal,
    eviction_signal: WakeSignal,
    progress_signal: WakeSignal,
}

impl<T> Chain<T> {
    pub fn new(limits: ChainLimits) -> Self {
        debug!(
            "Chain created: capacity {} bytes, eviction above {} bytes, fragment {} bytes",
            limits.capacity_bytes, limits.eviction_threshold_bytes, limits.fragment_size_bytes
        );
        Self {
            head: ArcSwapOption::empty(),
            tail: ArcSwapOption::empty(),
            occupied_bytes: CachePadded::new(AtomicU64::new(0)),
            indexing_tree_bytes: AtomicU64::new(0),
            limits,
            clear_lock: RwLock::new(()),
            cursors: RwLock::new(Vec::new()),
            counters: ChainCounters::default(),
            sequence_floor: AtomicU64::new(0),
            data_signal: WakeSignal::new(),
            eviction_signal: WakeSignal::new(),
            progress_signal: WakeSignal::new(),
        }
    }

    #[inline(always)]
    pub fn limits(&self) -> ChainLimits {
        self.limits
    }

    #[inline(always)]
    pub fn capacity_bytes(&self) -> u64 {
        self.limits.capacity_bytes
    }

    #[inline(always)]
    pub fn occupied_bytes(&self) -> u64 {
        self.occupied_bytes.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn indexing_tree_bytes(&self) -> u64 {
        self.indexing_tree_bytes.load(Ordering::Relaxed)
    }

    /// Record the latest reported size of the indexing tree
    pub fn set_indexing_tree_bytes(&self, bytes: u64) {
        self.indexing_tree_bytes.store(bytes, Ordering::Relaxed);
        if self.should_evict() {
            self.eviction_signal.notify();
        }
    }

    /// Append one payload as the newest element
    ///
    /// Never blocks. Returns the published element.
    pub fn append(&self, payload: T, size_bytes: u64) -> Arc<Element<T>> {
        let element = Arc::new(Element::new(payload, size_bytes));

        // counted before publishing so eviction never subtracts bytes not yet added
        self.occupied_bytes.fetch_add(size_bytes, Ordering::AcqRel);
        self.counters.record_added(size_bytes);

        let previous = loop {
            let current = self.head.load();
            let sequence = match &*current {
                Some(head) => head.sequence() + 1,
                None => self.sequence_floor.load(Ordering::Acquire) + 1,
            };
            element.assign_sequence(sequence);

            let witnessed = self.head.compare_and_swap(&current, Some(element.clone()));
            let won = match (&*witnessed, &*current) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if won {
                break (*current).clone();
            }
        };

        match previous {
            Some(previous) => {
                previous.link(element.clone());
            }
            None => self.tail.store(Some(element.clone())),
        }

        self.data_signal.notify();
        if self.should_evict() {
            self.eviction_signal.notify();
        }

        element
    }

    /// Shared side of the clear lock for one traversal step
    pub fn scan_read(&self) -> RwLockReadGuard<'_, ()> {
        self.clear_lock
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.clear_lock
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether occupancy plus the indexing tree exceeds the eviction threshold
    #[inline]
    pub fn should_evict(&self) -> bool {
        self.occupied_bytes() + self.indexing_tree_bytes() > self.limits.eviction_threshold_bytes
    }

    /// Next element `cursor` should process, `None` when caught up
    pub fn candidate(&self, cursor: &Cursor<T>) -> Option<Arc<Element<T>>> {
        match cursor.last() {
            Some(last) => last.next().cloned(),
            None => self.tail.load_full(),
        }
    }

    /// Whether `cursor` has processed everything published so far
    #[inline]
    pub fn is_caught_up(&self, cursor: &Cursor<T>) -> bool {
        match &*cursor.last.load() {
            Some(last) => last.next().is_none(),
            None => self.tail.load().is_none(),
        }
    }

    /// Block until `cursor` has a candidate
    pub fn await_data(&self, cursor: &Cursor<T>) -> Result<(), BufferOperationError> {
        self.data_signal.wait_until(|| !self.is_caught_up(cursor))
    }

    /// Block until eviction is due
    pub fn await_eviction_pressure(&self) -> Result<(), BufferOperationError> {
        self.eviction_signal.wait_until(|| self.should_evict())
    }

    /// Signal woken by every append
    #[inline]
    pub fn data_signal(&self) -> &WakeSignal {
        &self.data_signal
    }

    /// Signal woken whenever a consumer advances its cursor
    #[inline]
    pub fn progress_signal(&self) -> &WakeSignal {
        &self.progress_signal
    }

    /// Release every blocked wait, used only by shutdown
    pub fn interrupt(&self) {
        self.data_signal.interrupt();
        self.eviction_signal.interrupt();
        self.progress_signal.interrupt();
    }

    /// Create and register a consumer cursor at the sentinel
    pub fn register_cursor(&self, role: WorkerRole) -> Arc<Cursor<T>> {
        let cursor = Arc::new(Cursor::new(role));
        self.cursors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cursor.clone());
        cursor
    }

    /// First registered cursor for `role`
    pub fn cursor(&self, role: WorkerRole) -> Option<Arc<Cursor<T>>> {
        self.cursors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|cursor| cursor.role() == role)
            .cloned()
    }

    /// Number of elements between tail and head
    pub fn len(&self) -> usize {
        let _guard = self.scan_read();
        let mut count = 0;
        let mut current = self.tail.load_full();
        while let Some(element) = current {
            count += 1;
            current = element.next().cloned();
        }
        count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load().is_none()
    }

    /// Sum of element sizes between tail and head
    pub fn reachable_bytes(&self) -> u64 {
        let _guard = self.scan_read();
        let mut total = 0;
        let mut current = self.tail.load_full();
        while let Some(element) = current {
            total += element.size_bytes();
            current = element.next().cloned();
        }
        total
    }
}

impl<T: Clone> Chain<T> {
    /// Payload of the oldest element still buffered
    pub fn oldest_payload(&self) -> Option<T> {
        let _guard = self.scan_read();
        self.tail.load_full().map(|e| e.payload().clone())
    }

    /// Payload of the most recently appended element
    pub fn newest_payload(&self) -> Option<T> {
        self.head.load_full().map(|e| e.payload().clone())
    }

    /// Payloads from oldest to newest
    pub fn snapshot(&self) -> Vec<T> {
        let _guard = self.scan_read();
        let mut payloads = Vec::new();
        let mut current = self.tail.load_full();
        while let Some(element) = current {
            payloads.push(element.payload().clone());
            current = element.next().cloned();
        }
        payloads
    }
}

impl<T> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("limits", &self.limits)
            .field("occupied_bytes", &self.occupied_bytes())
            .field("indexing_tree_bytes", &self.indexing_tree_bytes())
            .finish()
    }
}
