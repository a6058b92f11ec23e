//! Per-consumer position in the chain

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use crossbeam_utils::CachePadded;

use super::element::Element;
use crate::buffer::traits::WorkerRole;

/// Last element one consumer has processed
///
/// Only the owning scan engine advances a cursor, and only under the shared
/// side of the clear lock. The evictor resets it under the exclusive side.
/// `position` is the highest sequence ever processed and never decreases,
/// even when eviction resets `last` to the sentinel.
#[derive(Debug)]
pub struct Cursor<T> {
    role: WorkerRole,
    pub(super) last: ArcSwapOption<Element<T>>,
    position: CachePadded<AtomicU64>,
    processed: AtomicU64,
}

impl<T> Cursor<T> {
    pub fn new(role: WorkerRole) -> Self {
        Self {
            role,
            last: ArcSwapOption::empty(),
            position: CachePadded::new(AtomicU64::new(0)),
            processed: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn role(&self) -> WorkerRole {
        self.role
    }

    /// Last processed element, `None` at the sentinel
    #[inline]
    pub fn last(&self) -> Option<Arc<Element<T>>> {
        self.last.load_full()
    }

    /// Sequence of the newest element this consumer processed
    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    /// Number of elements this consumer handled
    #[inline(always)]
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub(crate) fn advance(&self, element: &Arc<Element<T>>) {
        self.last.store(Some(element.clone()));
        self.position
            .fetch_max(element.sequence(), Ordering::AcqRel);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Move back to the sentinel if the last element is older than `sequence`
    pub(crate) fn reset_if_before(&self, sequence: u64) -> bool {
        let stale = self
            .last
            .load_full()
            .is_some_and(|last| last.sequence() < sequence);
        if stale {
            self.last.store(None);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(sequence: u64) -> Arc<Element<u32>> {
        let element = Element::new(sequence as u32, 8);
        element.assign_sequence(sequence);
        Arc::new(element)
    }

    #[test]
    fn test_advance_tracks_position() {
        let cursor = Cursor::new(WorkerRole::Indexer);
        assert!(cursor.last().is_none());
        assert_eq!(cursor.position(), 0);

        cursor.advance(&element(1));
        cursor.advance(&element(2));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.processed_count(), 2);
        assert_eq!(cursor.last().unwrap().sequence(), 2);
    }

    #[test]
    fn test_reset_keeps_position() {
        let cursor = Cursor::new(WorkerRole::Analyzer);
        cursor.advance(&element(4));

        assert!(!cursor.reset_if_before(4));
        assert!(cursor.last().is_some());

        assert!(cursor.reset_if_before(5));
        assert!(cursor.last().is_none());
        assert_eq!(cursor.position(), 4);
    }
}
