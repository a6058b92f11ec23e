//! Generic wait/drain loop shared by the indexer and the analyzer

use std::sync::Arc;
use std::time::Duration;

use log::trace;

use crate::buffer::chain::{Chain, Cursor, Element};
use crate::buffer::traits::{BufferOperationError, DrainOutcome, ProcessOutcome, WorkerRole};

/// One "process this element" step injected into a scan engine
pub trait ElementProcessor<T>: Send {
    /// Handle `candidate`, or report that it is not ready for this consumer
    fn process(&mut self, candidate: &Arc<Element<T>>, cursor: &Cursor<T>) -> ProcessOutcome;
}

impl<T, F> ElementProcessor<T> for F
where
    F: FnMut(&Arc<Element<T>>, &Cursor<T>) -> ProcessOutcome + Send,
{
    #[inline]
    fn process(&mut self, candidate: &Arc<Element<T>>, cursor: &Cursor<T>) -> ProcessOutcome {
        self(candidate, cursor)
    }
}

/// Drains the chain in insertion order from a private cursor
///
/// Idle until the cursor catches up, Waiting while blocked on the data
/// signal, Draining while handing candidates to the processor. Each
/// [`drain`](Self::drain) call processes at most one element.
pub struct ScanEngine<T, P> {
    chain: Arc<Chain<T>>,
    cursor: Arc<Cursor<T>>,
    processor: P,
    retry_wait: Duration,
}

impl<T, P> ScanEngine<T, P>
where
    P: ElementProcessor<T>,
{
    /// Register a cursor for `role` and bind `processor` to it
    pub fn new(chain: Arc<Chain<T>>, role: WorkerRole, processor: P, retry_wait: Duration) -> Self {
        let cursor = chain.register_cursor(role);
        Self {
            chain,
            cursor,
            processor,
            retry_wait,
        }
    }

    #[inline]
    pub fn cursor(&self) -> &Arc<Cursor<T>> {
        &self.cursor
    }

    #[inline]
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Whether the cursor has processed everything published so far
    #[inline]
    pub fn is_caught_up(&self) -> bool {
        self.chain.is_caught_up(&self.cursor)
    }

    /// Block until there is something to process
    pub fn wait_for_work(&self) -> Result<(), BufferOperationError> {
        self.chain.await_data(&self.cursor)
    }

    /// Process at most one element
    ///
    /// Returns immediately with `CaughtUp` when nothing is pending. A "not
    /// yet" answer releases the shared lock and retries once another
    /// consumer advances or the retry wait elapses, without moving the
    /// cursor.
    pub fn drain(&mut self) -> Result<DrainOutcome, BufferOperationError> {
        loop {
            {
                let _guard = self.chain.scan_read();
                let Some(candidate) = self.chain.candidate(&self.cursor) else {
                    return Ok(DrainOutcome::CaughtUp);
                };
                if self.processor.process(&candidate, &self.cursor) == ProcessOutcome::Handled {
                    self.cursor.advance(&candidate);
                    self.chain.progress_signal().notify();
                    return Ok(DrainOutcome::Advanced);
                }
                trace!(
                    "{} deferred element {}",
                    self.cursor.role(),
                    candidate.sequence()
                );
            }
            // another consumer advancing is what turns "not yet" into a yes
            self.chain.progress_signal().wait_timeout(self.retry_wait)?;
        }
    }

    /// Wait for work, then process one element
    pub fn cycle(&mut self) -> Result<DrainOutcome, BufferOperationError> {
        self.wait_for_work()?;
        self.drain()
    }
}
