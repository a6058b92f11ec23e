//! Chain node holding one buffered payload

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// One buffered payload linked toward the next-newer element
///
/// Everything except `next` is fixed once the element is published. `next`
/// is written exactly once, by the producer that appended the successor.
pub struct Element<T> {
    payload: T,
    size_bytes: u64,
    sequence: AtomicU64,
    next: OnceLock<Arc<Element<T>>>,
}

impl<T> Element<T> {
    pub(crate) fn new(payload: T, size_bytes: u64) -> Self {
        Self {
            payload,
            size_bytes,
            sequence: AtomicU64::new(0),
            next: OnceLock::new(),
        }
    }

    /// Buffered payload
    #[inline(always)]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Estimated footprint including the expansion rate
    #[inline(always)]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Insertion sequence number, starting at 1 for the first element
    #[inline(always)]
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Next-newer element, `None` while this element is the newest
    #[inline(always)]
    pub fn next(&self) -> Option<&Arc<Element<T>>> {
        self.next.get()
    }

    /// Only valid before the element is published
    pub(crate) fn assign_sequence(&self, sequence: u64) {
        self.sequence.store(sequence, Ordering::Release);
    }

    /// Returns false if a successor was already linked
    pub(crate) fn link(&self, successor: Arc<Element<T>>) -> bool {
        self.next.set(successor).is_ok()
    }
}

impl<T> fmt::Debug for Element<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("sequence", &self.sequence())
            .field("size_bytes", &self.size_bytes)
            .field("linked", &self.next.get().is_some())
            .finish()
    }
}

impl<T> Drop for Element<T> {
    fn drop(&mut self) {
        // unlink iteratively, a long detached run would otherwise recurse once per node
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut inner) => next = inner.next.take(),
                Err(_) => break,
            }
        }
    }
}
