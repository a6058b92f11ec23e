//! Fragment eviction from the oldest end of the chain

use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::debug;

use super::core::Chain;
use super::element::Element;

/// Result of one eviction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    pub elements: u64,
    pub bytes: u64,
    /// Cursors moved back to the sentinel because their element was removed
    pub cursors_reset: u64,
}

impl EvictionOutcome {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements == 0
    }
}

impl<T> Chain<T> {
    /// Remove one fragment of the oldest elements
    ///
    /// Walks from the tail accumulating sizes until the fragment size is
    /// reached. An element whose successor is not linked yet is never
    /// removed, so the newest element always survives. `release` runs for
    /// every removed payload after the exclusive lock is dropped.
    pub fn evict<F>(&self, release: F) -> EvictionOutcome
    where
        F: FnMut(&T),
    {
        self.remove_oldest(self.limits.fragment_size_bytes, false, release)
    }

    /// Remove every buffered element and reset the indexing tree size
    ///
    /// Producers keep appending while this runs. The newest element goes too
    /// unless a producer is already appending behind it; anything published
    /// after the clear stays buffered. Sequence numbers keep increasing.
    pub fn clear<F>(&self, release: F) -> EvictionOutcome
    where
        F: FnMut(&T),
    {
        self.remove_oldest(u64::MAX, true, release)
    }

    fn remove_oldest<F>(
        &self,
        budget_bytes: u64,
        include_newest: bool,
        mut release: F,
    ) -> EvictionOutcome
    where
        F: FnMut(&T),
    {
        let mut removed: Vec<Arc<Element<T>>> = Vec::new();
        let mut outcome = EvictionOutcome::default();

        {
            let _guard = self.exclusive();

            let mut current = self.tail.load_full();
            while outcome.bytes < budget_bytes || removed.is_empty() {
                let Some(element) = current.take() else {
                    break;
                };
                let Some(next) = element.next().cloned() else {
                    current = Some(element);
                    break;
                };
                outcome.bytes += element.size_bytes();
                removed.push(element);
                current = Some(next);
            }

            // `current` is the first survivor, `None` only for an empty chain
            let mut new_tail = current;
            if include_newest {
                if let Some(newest) = new_tail.take() {
                    if self.detach_newest(&newest) {
                        outcome.bytes += newest.size_bytes();
                        removed.push(newest);
                    } else {
                        new_tail = Some(newest);
                    }
                }
                self.indexing_tree_bytes.store(0, Ordering::Relaxed);
            }

            if removed.is_empty() {
                return outcome;
            }

            let boundary = new_tail.as_ref().map_or(u64::MAX, |e| e.sequence());
            if new_tail.is_some() {
                self.tail.store(new_tail);
            }
            self.occupied_bytes
                .fetch_sub(outcome.bytes, Ordering::AcqRel);

            let cursors = self
                .cursors
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for cursor in cursors.iter() {
                if cursor.reset_if_before(boundary) {
                    outcome.cursors_reset += 1;
                }
            }
        }

        outcome.elements = removed.len() as u64;
        self.counters.record_evicted(outcome.elements, outcome.bytes);

        for element in &removed {
            release(element.payload());
        }

        debug!(
            "Removed {} elements ({} bytes), {} bytes still occupied",
            outcome.elements,
            outcome.bytes,
            self.occupied_bytes()
        );
        outcome
    }

    /// Unpublish the newest element unless a producer already appended past it
    ///
    /// Caller holds the exclusive lock and `newest` is the current tail.
    fn detach_newest(&self, newest: &Arc<Element<T>>) -> bool {
        if newest.next().is_some() {
            return false;
        }
        // a producer seeing the empty head numbers its element above this
        self.sequence_floor
            .fetch_max(newest.sequence(), Ordering::AcqRel);

        let witnessed = self.head.compare_and_swap(newest, None);
        let detached = match &*witnessed {
            Some(head) => Arc::ptr_eq(head, newest),
            None => false,
        };
        if detached {
            // a producer appending into the empty chain may have set the tail already
            self.tail.compare_and_swap(newest, None);
        }
        detached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::chain::core::ChainLimits;
    use crate::buffer::traits::WorkerRole;

    fn scenario_chain() -> Chain<u64> {
        Chain::new(ChainLimits::from_fractions(10_240, 0.8, 0.1))
    }

    #[test]
    fn test_scenario_insert_evict_cycle() {
        let chain = scenario_chain();
        let mut released = Vec::new();
        let mut first_eviction_at = None;

        for i in 1..=40u64 {
            chain.append(i, 1_024);
            assert!(chain.occupied_bytes() <= 8_192 + 1_024);
            if chain.should_evict() {
                first_eviction_at.get_or_insert(i);
                let outcome = chain.evict(|p| released.push(*p));
                assert_eq!(outcome.elements, 1);
                assert_eq!(outcome.bytes, 1_024);
                assert_eq!(chain.occupied_bytes(), 8_192);
            }
            assert_eq!(chain.occupied_bytes(), chain.reachable_bytes());
        }

        assert_eq!(first_eviction_at, Some(9));
        // oldest first
        assert_eq!(released, (1..=32).collect::<Vec<_>>());
        assert_eq!(chain.oldest_payload(), Some(33));
    }

    #[test]
    fn test_newest_element_survives() {
        let chain: Chain<u64> = Chain::new(ChainLimits::from_fractions(1_000, 0.1, 0.5));
        chain.append(1, 10_000);
        assert!(chain.should_evict());

        let outcome = chain.evict(|_| {});
        assert!(outcome.is_empty());
        assert_eq!(chain.newest_payload(), Some(1));
        assert_eq!(chain.occupied_bytes(), 10_000);

        chain.append(2, 10);
        let outcome = chain.evict(|_| {});
        assert_eq!(outcome.elements, 1);
        assert_eq!(chain.snapshot(), vec![2]);
        assert_eq!(chain.occupied_bytes(), 10);
    }

    #[test]
    fn test_fragment_accumulates_small_elements() {
        let chain = scenario_chain();
        for i in 0..10u64 {
            chain.append(i, 300);
        }
        // 4 * 300 >= 1_024
        let outcome = chain.evict(|_| {});
        assert_eq!(outcome.elements, 4);
        assert_eq!(outcome.bytes, 1_200);
        assert_eq!(chain.occupied_bytes(), 1_800);
        assert_eq!(chain.oldest_payload(), Some(4));
    }

    #[test]
    fn test_cursor_inside_fragment_is_reset() {
        let chain = scenario_chain();
        let behind = chain.register_cursor(WorkerRole::Analyzer);
        let ahead = chain.register_cursor(WorkerRole::Indexer);

        for i in 0..5u64 {
            chain.append(i, 1_024);
        }
        // behind processed only the oldest, ahead processed three
        let oldest = chain.candidate(&behind).unwrap();
        behind.advance(&oldest);
        for _ in 0..3 {
            let next = chain.candidate(&ahead).unwrap();
            ahead.advance(&next);
        }

        let outcome = chain.evict(|_| {});
        assert_eq!(outcome.elements, 1);
        assert_eq!(outcome.cursors_reset, 1);

        // reset cursor resumes at the new tail, position never moves back
        assert!(behind.last().is_none());
        assert_eq!(behind.position(), 1);
        assert_eq!(*chain.candidate(&behind).unwrap().payload(), 1);
        assert_eq!(*chain.candidate(&ahead).unwrap().payload(), 3);
    }

    #[test]
    fn test_evict_empty_chain() {
        let chain = scenario_chain();
        assert!(chain.evict(|_| {}).is_empty());
    }

    #[test]
    fn test_clear_removes_newest_and_keeps_numbering() {
        let chain = scenario_chain();
        let cursor = chain.register_cursor(WorkerRole::Analyzer);
        for i in 1..=5u64 {
            chain.append(i, 100);
        }
        for _ in 0..3 {
            let next = chain.candidate(&cursor).unwrap();
            cursor.advance(&next);
        }
        chain.set_indexing_tree_bytes(4_000);

        let mut released = Vec::new();
        let outcome = chain.clear(|p| released.push(*p));
        assert_eq!(outcome.elements, 5);
        assert_eq!(outcome.bytes, 500);
        assert_eq!(outcome.cursors_reset, 1);
        assert_eq!(released, vec![1, 2, 3, 4, 5]);

        assert!(chain.is_empty());
        assert!(chain.snapshot().is_empty());
        assert_eq!(chain.occupied_bytes(), 0);
        assert_eq!(chain.indexing_tree_bytes(), 0);
        assert!(chain.is_caught_up(&cursor));
        assert_eq!(cursor.position(), 3);

        // numbering continues, the cleared cursor picks up the new element
        let element = chain.append(6, 100);
        assert_eq!(element.sequence(), 6);
        assert_eq!(*chain.candidate(&cursor).unwrap().payload(), 6);
        assert_eq!(chain.snapshot(), vec![6]);
        assert_eq!(chain.occupied_bytes(), 100);
    }

    #[test]
    fn test_clear_empty_chain() {
        let chain = scenario_chain();
        assert!(chain.clear(|_| {}).is_empty());
        assert_eq!(chain.append(1, 8).sequence(), 1);
    }

    #[test]
    fn test_clear_races_with_producers() {
        use std::thread;

        let chain = Arc::new(Chain::<u64>::new(ChainLimits::from_fractions(
            1 << 40,
            0.8,
            0.1,
        )));
        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let chain = chain.clone();
                thread::spawn(move || {
                    for i in 0..2_000 {
                        chain.append(p * 10_000 + i, 16);
                    }
                })
            })
            .collect();

        let mut cleared = 0;
        while !producers.iter().all(|h| h.is_finished()) {
            cleared += chain.clear(|_| {}).elements;
            thread::yield_now();
        }
        for handle in producers {
            handle.join().unwrap();
        }

        // whatever survived is fully linked and accounted
        assert_eq!(chain.occupied_bytes(), chain.reachable_bytes());
        let survivors = chain.len() as u64;
        assert_eq!(cleared + survivors, 8_000);

        cleared += chain.clear(|_| {}).elements;
        assert_eq!(cleared, 8_000);
        assert!(chain.is_empty());
        assert_eq!(chain.occupied_bytes(), 0);
        assert_eq!(chain.stats().elements_evicted, 8_000);
    }
}
