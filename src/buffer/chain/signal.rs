//! Lock + notify wake-up signal with a shutdown interruption flag
//!
//! Producers never take the lock unless someone is actually waiting. A
//! waiter announces itself in `waiters` before its final check, and the
//! producer publishes before reading `waiters`; the SeqCst fences on both
//! sides guarantee at least one of them sees the other. Timed waits have no
//! condition of their own and watch the notify epoch instead.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering, fence};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::buffer::traits::BufferOperationError;

#[derive(Debug, Default)]
pub struct WakeSignal {
    lock: Mutex<()>,
    condvar: Condvar,
    waiters: AtomicUsize,
    epoch: AtomicU64,
    interrupted: AtomicBool,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every waiter, called after the state they wait on was published
    pub fn notify(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) > 0 {
            let _guard = self.guard();
            self.condvar.notify_all();
        }
    }

    /// Make every current and future wait return `Interrupted`
    ///
    /// Sticky: only shutdown interrupts, and a stopping worker must not block
    /// again.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        let _guard = self.guard();
        self.condvar.notify_all();
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Number of threads currently blocked or about to block
    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }

    /// Block until `ready` holds
    ///
    /// `ready` is checked lock-free first, then again under the lock after
    /// registering as a waiter, closing the window where a producer publishes
    /// between the two.
    pub fn wait_until<F>(&self, ready: F) -> Result<(), BufferOperationError>
    where
        F: Fn() -> bool,
    {
        if self.is_interrupted() {
            return Err(BufferOperationError::Interrupted);
        }
        if ready() {
            return Ok(());
        }

        self.waiters.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let mut guard = self.guard();
        let result = loop {
            if self.is_interrupted() {
                break Err(BufferOperationError::Interrupted);
            }
            if ready() {
                break Ok(());
            }
            guard = self
                .condvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        };
        drop(guard);

        self.waiters.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Sleep up to `timeout`, returning early on notify
    ///
    /// A notify issued after this call started ends the wait, even one that
    /// lands before the lock is taken.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), BufferOperationError> {
        if self.is_interrupted() {
            return Err(BufferOperationError::Interrupted);
        }
        let observed = self.epoch.load(Ordering::SeqCst);
        let deadline = Instant::now() + timeout;

        self.waiters.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let mut guard = self.guard();
        let result = loop {
            if self.is_interrupted() {
                break Err(BufferOperationError::Interrupted);
            }
            if self.epoch.load(Ordering::SeqCst) != observed {
                break Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Ok(());
            }
            guard = self
                .condvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        };
        drop(guard);

        self.waiters.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_ready_returns_immediately() {
        let signal = WakeSignal::new();
        assert!(signal.wait_until(|| true).is_ok());
        assert_eq!(signal.waiter_count(), 0);
    }

    #[test]
    fn test_notify_wakes_waiter() {
        let signal = Arc::new(WakeSignal::new());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let signal = signal.clone();
            let flag = flag.clone();
            thread::spawn(move || signal.wait_until(|| flag.load(Ordering::SeqCst)))
        };

        while signal.waiter_count() == 0 {
            thread::yield_now();
        }
        flag.store(true, Ordering::SeqCst);
        signal.notify();

        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(signal.waiter_count(), 0);
    }

    #[test]
    fn test_interrupt_releases_blocked_waiter() {
        let signal = Arc::new(WakeSignal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait_until(|| false))
        };

        while signal.waiter_count() == 0 {
            thread::yield_now();
        }
        signal.interrupt();

        assert_eq!(
            waiter.join().unwrap(),
            Err(BufferOperationError::Interrupted)
        );
        // sticky
        assert_eq!(
            signal.wait_until(|| false),
            Err(BufferOperationError::Interrupted)
        );
    }

    #[test]
    fn test_notify_ends_timed_wait_early() {
        let signal = Arc::new(WakeSignal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let result = signal.wait_timeout(Duration::from_secs(30));
                (result, start.elapsed())
            })
        };

        while signal.waiter_count() == 0 {
            thread::yield_now();
        }
        signal.notify();

        let (result, elapsed) = waiter.join().unwrap();
        assert!(result.is_ok());
        assert!(elapsed < Duration::from_secs(10), "woke after {:?}", elapsed);
        assert_eq!(signal.waiter_count(), 0);
    }

    #[test]
    fn test_interrupt_ends_timed_wait() {
        let signal = Arc::new(WakeSignal::new());
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait_timeout(Duration::from_secs(30)))
        };

        while signal.waiter_count() == 0 {
            thread::yield_now();
        }
        signal.interrupt();

        assert_eq!(
            waiter.join().unwrap(),
            Err(BufferOperationError::Interrupted)
        );
    }

    #[test]
    fn test_wait_timeout_elapses() {
        let signal = WakeSignal::new();
        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_millis(20)).is_ok());
        assert!(start.elapsed() < Duration::from_secs(5));

        signal.interrupt();
        assert_eq!(
            signal.wait_timeout(Duration::from_secs(5)),
            Err(BufferOperationError::Interrupted)
        );
    }
}
